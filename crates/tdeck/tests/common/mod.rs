//! Host board built from `platform::mocks`.

#![allow(dead_code)]

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use platform::mocks::{
    EventLog, MockBacklight, MockCardMount, MockInterruptController, MockKeyboard, MockPin,
    MockSpiBus, MockTouch,
};
use tdeck::{BoardResources, BoardTypes, TDeck};

/// Mock-backed board types.
pub struct Host;

impl BoardTypes for Host {
    type Mutex = CriticalSectionRawMutex;
    type Spi = MockSpiBus;
    type Pin = MockPin;
    type Gpio = MockInterruptController;
    type Backlight = MockBacklight;
    type Touch = MockTouch;
    type Keyboard = MockKeyboard;
    type Card = MockCardMount;
}

/// Test-side handles onto the mocks owned by the board.
pub struct Rig {
    pub log: EventLog,
    pub gpio: MockInterruptController,
    pub touch: MockTouch,
    pub keyboard: MockKeyboard,
    pub card: MockCardMount,
    pub backlight: MockBacklight,
    pub power: MockPin,
    pub sd_cs: MockPin,
}

pub fn board<'a>() -> (TDeck<'a, Host>, Rig) {
    board_with_spi(|log| MockSpiBus::new(log))
}

pub fn board_with_spi<'a>(spi: impl FnOnce(EventLog) -> MockSpiBus) -> (TDeck<'a, Host>, Rig) {
    let log = EventLog::new();
    let rig = Rig {
        log: log.clone(),
        gpio: MockInterruptController::new(),
        touch: MockTouch::new(),
        keyboard: MockKeyboard::new(),
        card: MockCardMount::new(),
        backlight: MockBacklight::new(),
        power: MockPin::new("power"),
        sd_cs: MockPin::logged("sd_cs", &log),
    };
    let board = TDeck::new(BoardResources {
        spi: spi(log.clone()),
        gpio: rig.gpio.clone(),
        lcd_cs: MockPin::logged("lcd_cs", &log),
        lcd_dc: MockPin::logged("lcd_dc", &log),
        sd_cs: rig.sd_cs.clone(),
        peripheral_power: rig.power.clone(),
        backlight: rig.backlight.clone(),
        touch: rig.touch.clone(),
        keyboard: rig.keyboard.clone(),
        card: rig.card.clone(),
    });
    (board, rig)
}
