//! Device registry tests against the mock board.
//!
//! Run with: cargo test -p tdeck --test board

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

mod common;

use std::sync::Mutex;

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use platform::mocks::{BusEvent, MockCardMount, MockSpiBus};
use platform::{
    ActiveLevel, InterruptTrigger, PinState, PointerData, Rotation, SdCardConfig, TouchpadData,
};
use playback::AudioError;
use tdeck::pins;
use tdeck::{
    BoardError, DisplayConfig, EdgeOutcome, InterruptError, InterruptSource, KeyboardConfig,
    KeyboardMode, LcdConfig, PinInterruptConfig, SoundConfig, Subsystem, TaskConfig,
};

fn at_ms(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

// ---------------------------------------------------------------------------
// uSD card
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_sdcard_config_touches_nothing() {
    let (board, rig) = common::board();

    let result = board
        .initialize_sdcard(SdCardConfig {
            allocation_unit_size: 0,
            ..SdCardConfig::default()
        })
        .await;

    assert!(matches!(result, Err(BoardError::InvalidConfig(_))));
    assert_eq!(board.sdcard(), None);
    assert!(rig.card.mount_attempts().is_empty());
    assert!(!board.spi().is_initialized());
}

#[tokio::test]
async fn failed_mount_can_be_retried() {
    let (board, rig) = common::board();
    rig.card.set_fail_mount(true);

    assert_eq!(
        board.initialize_sdcard(SdCardConfig::default()).await,
        Err(BoardError::InitializationFailure(Subsystem::SdCard))
    );
    assert_eq!(board.sdcard(), None);
    assert!(!rig.card.is_mounted());
    assert!(rig.sd_cs.is_high(), "card left deselected");
    assert!(matches!(
        board.sdcard_device(),
        Err(BoardError::NotInitialized(Subsystem::SdCard))
    ));

    rig.card.set_fail_mount(false);
    board.initialize_sdcard(SdCardConfig::default()).await.unwrap();

    assert_eq!(board.sdcard(), Some(MockCardMount::INFO));
    assert!(rig.card.is_mounted());
    assert_eq!(rig.card.mount_attempts().len(), 2);
    assert!(board.sdcard_device().is_ok());
    // Both attempts clocked the wake-up bytes with the card selected.
    assert_eq!(rig.log.writes_while_selected("sd_cs"), vec![vec![0xFF; 10]; 2]);
}

#[tokio::test]
async fn bus_claim_failure_is_reported_per_subsystem() {
    let (board, _rig) = common::board_with_spi(|log| MockSpiBus::new(log).failing_configure());

    assert_eq!(
        board.initialize_sdcard(SdCardConfig::default()).await,
        Err(BoardError::InitializationFailure(Subsystem::Spi))
    );
    assert_eq!(
        board.initialize_lcd(LcdConfig::default()).await,
        Err(BoardError::InitializationFailure(Subsystem::Spi))
    );
}

// ---------------------------------------------------------------------------
// LCD and display
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lcd_bring_up_sequence() {
    let (board, rig) = common::board();

    board.initialize_lcd(LcdConfig::default()).await.unwrap();

    assert_eq!(
        rig.log.writes_while_selected("lcd_cs"),
        vec![
            vec![0x01],
            vec![0x11],
            vec![0x3A, 0x55],
            vec![0x36, Rotation::Landscape.madctl()],
            vec![0x21],
            vec![0x13],
            vec![0x29],
        ]
    );
    assert_eq!(rig.backlight.duty(), 255, "backlight on at 100 %");
}

#[tokio::test]
async fn lcd_clock_is_validated() {
    let (board, _rig) = common::board();
    let result = board
        .initialize_lcd(LcdConfig {
            clock_hz: 0,
            ..LcdConfig::default()
        })
        .await;
    assert!(matches!(result, Err(BoardError::InvalidConfig(_))));

    // Nothing was consumed; a valid config still works.
    board.initialize_lcd(LcdConfig::default()).await.unwrap();
}

#[tokio::test]
async fn display_requires_lcd_and_valid_buffer() {
    let (board, _rig) = common::board();

    assert_eq!(
        board.initialize_display(DisplayConfig::default()).await,
        Err(BoardError::NotInitialized(Subsystem::Lcd))
    );
    board.initialize_lcd(LcdConfig::default()).await.unwrap();
    let result = board
        .initialize_display(DisplayConfig {
            pixel_buffer_size: 0,
            ..DisplayConfig::default()
        })
        .await;
    assert!(matches!(result, Err(BoardError::InvalidConfig(_))));
    assert_eq!(board.display_config(), None);

    board
        .initialize_display(DisplayConfig::default())
        .await
        .unwrap();
    assert_eq!(board.display_config(), Some(DisplayConfig::default()));
}

#[tokio::test]
async fn display_rotation_is_sent_to_the_panel() {
    let (board, rig) = common::board();
    board.initialize_lcd(LcdConfig::default()).await.unwrap();
    rig.log.clear();

    board
        .initialize_display(DisplayConfig {
            rotation: Rotation::Portrait,
            ..DisplayConfig::default()
        })
        .await
        .unwrap();
    board.set_rotation(Rotation::LandscapeInverted).await.unwrap();

    assert_eq!(
        rig.log.writes_while_selected("lcd_cs"),
        vec![
            vec![0x36, Rotation::Portrait.madctl()],
            vec![0x36, Rotation::LandscapeInverted.madctl()],
        ]
    );
    assert_eq!(board.rotation(), Rotation::LandscapeInverted);
    assert_eq!(
        board.display_config().map(|d| d.rotation),
        Some(Rotation::LandscapeInverted)
    );
}

#[tokio::test]
async fn frame_writes_are_windowed_and_length_checked() {
    let (board, rig) = common::board();
    assert_eq!(
        board.write_lcd_frame(0, 0, 1, 1, &[0, 0]).await,
        Err(BoardError::NotInitialized(Subsystem::Lcd))
    );
    board.initialize_lcd(LcdConfig::default()).await.unwrap();
    rig.log.clear();

    assert!(matches!(
        board.write_lcd_frame(10, 20, 2, 1, &[0xF8, 0x00]).await,
        Err(BoardError::InvalidConfig(_))
    ));
    assert!(matches!(
        board.write_lcd_frame(319, 0, 2, 1, &[0; 4]).await,
        Err(BoardError::InvalidConfig(_))
    ));
    assert!(rig.log.writes_while_selected("lcd_cs").is_empty());

    board
        .write_lcd_frame(10, 20, 2, 1, &[0xF8, 0x00, 0x07, 0xE0])
        .await
        .unwrap();
    board
        .write_lcd_lines(0, 239, 0, 239, &[0xFF, 0xFF])
        .await
        .unwrap();

    assert_eq!(
        rig.log.writes_while_selected("lcd_cs"),
        vec![
            vec![0x2A, 0, 10, 0, 11],
            vec![0x2B, 0, 20, 0, 20],
            vec![0x2C, 0xF8, 0x00, 0x07, 0xE0],
            vec![0x2A, 0, 0, 0, 0],
            vec![0x2B, 0, 239, 0, 239],
            vec![0x2C, 0xFF, 0xFF],
        ]
    );
}

#[tokio::test]
async fn lcd_and_card_share_the_bus_without_overlap() {
    use embedded_hal_async::spi::SpiDevice;

    let (board, rig) = common::board();
    board.initialize_lcd(LcdConfig::default()).await.unwrap();
    board.initialize_sdcard(SdCardConfig::default()).await.unwrap();
    rig.log.clear();

    let frames = async {
        for _ in 0..5 {
            board.write_lcd_frame(0, 0, 4, 1, &[0xAA; 8]).await.unwrap();
        }
    };
    let card = async {
        let mut card = board.sdcard_device().unwrap();
        for _ in 0..5 {
            card.write(&[0x51, 0, 0, 0, 0, 0xFF]).await.unwrap();
        }
    };
    embassy_futures::join::join(frames, card).await;

    // Every write lands inside exactly one device's window.
    let mut selected: Option<&str> = None;
    for event in rig.log.events() {
        match event {
            BusEvent::Pin { name, high } if name.ends_with("cs") => {
                if high {
                    if selected == Some(name) {
                        selected = None;
                    }
                } else {
                    assert_eq!(selected, None, "{name} selected over another device");
                    selected = Some(name);
                }
            }
            BusEvent::Write(_) => assert!(selected.is_some()),
            _ => {}
        }
    }
    assert_eq!(rig.log.writes_while_selected("sd_cs").len(), 5);
}

#[tokio::test]
async fn brightness_is_stored_until_the_lcd_is_up() {
    let (board, rig) = common::board();

    board.set_brightness(75).unwrap();
    assert_eq!(board.brightness(), 75);
    assert_eq!(rig.backlight.duty(), 0);

    board.initialize_lcd(LcdConfig::default()).await.unwrap();
    assert_eq!(rig.backlight.duty(), 191);

    board.set_brightness(150).unwrap();
    assert_eq!(board.brightness(), 100);
    assert_eq!(rig.backlight.duty(), 255);
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[tokio::test]
async fn touch_interrupt_reaches_the_callback() {
    let touches = Mutex::new(Vec::new());
    let on_touch = |data: &TouchpadData| touches.lock().unwrap().push(*data);
    let (board, rig) = common::board();

    board.initialize_touch(&on_touch).await.unwrap();
    assert!(rig.touch.is_initialized());
    assert_eq!(
        board.interrupts().registration(pins::TOUCH_INTERRUPT).map(|c| c.trigger),
        Some(InterruptTrigger::Rising)
    );

    let sample = TouchpadData {
        num_touch_points: 1,
        x: 10,
        y: 300,
        ..TouchpadData::default()
    };
    rig.touch.push_sample(sample);
    assert_eq!(
        board.interrupts().on_edge_at(pins::TOUCH_INTERRUPT, PinState::High, at_ms(0)),
        EdgeOutcome::Queued
    );
    assert_eq!(board.interrupts().process_pending(&board).await, Ok(1));

    assert_eq!(*touches.lock().unwrap(), vec![sample]);
    assert_eq!(board.touchpad_data(), sample);
    let converted = board.touchpad_convert(sample);
    assert!(converted.converted);
    assert_eq!((converted.x, converted.y), (300, 229));
}

#[tokio::test]
async fn touch_probe_failure_registers_nothing() {
    let on_touch = |_: &TouchpadData| {};
    let (board, rig) = common::board();
    rig.touch.set_fail_init(true);

    assert_eq!(
        board.initialize_touch(&on_touch).await,
        Err(BoardError::InitializationFailure(Subsystem::Touch))
    );
    assert!(!board.interrupts().is_registered(pins::TOUCH_INTERRUPT));

    rig.touch.set_fail_init(false);
    board.initialize_touch(&on_touch).await.unwrap();
    assert!(board.interrupts().is_registered(pins::TOUCH_INTERRUPT));
}

#[tokio::test]
async fn trackball_moves_pointer_and_reports_button() {
    let moves = Mutex::new(Vec::new());
    let on_move = |pointer: &PointerData| moves.lock().unwrap().push(*pointer);
    let (board, _rig) = common::board();
    board.initialize_trackball(&on_move, 10).await.unwrap();
    assert_eq!(board.interrupts().registered_pins().len(), 5);

    let dispatcher = board.interrupts();
    dispatcher.on_edge_at(pins::TRACKBALL_RIGHT, PinState::Low, at_ms(0));
    dispatcher.on_edge_at(pins::TRACKBALL_DOWN, PinState::Low, at_ms(10));
    dispatcher.on_edge_at(pins::TRACKBALL_DOWN, PinState::Low, at_ms(20));
    // Rollers ignore the release edge.
    assert_eq!(
        dispatcher.on_edge_at(pins::TRACKBALL_RIGHT, PinState::High, at_ms(30)),
        EdgeOutcome::Ignored
    );
    dispatcher.on_edge_at(pins::TRACKBALL_BUTTON, PinState::Low, at_ms(40));
    assert_eq!(dispatcher.process_pending(&board).await, Ok(4));

    let pointer = board.trackball_data();
    assert_eq!((pointer.x, pointer.y), (10, 20));
    assert!(pointer.left_pressed);
    assert_eq!(moves.lock().unwrap().len(), 4);

    dispatcher.on_edge_at(pins::TRACKBALL_BUTTON, PinState::High, at_ms(50));
    board.set_trackball_sensitivity(3);
    dispatcher.on_edge_at(pins::TRACKBALL_LEFT, PinState::Low, at_ms(60));
    dispatcher.process_pending(&board).await.unwrap();

    let pointer = board.trackball_data();
    assert_eq!((pointer.x, pointer.y), (7, 20));
    assert!(!pointer.left_pressed);
}

#[tokio::test]
async fn quick_taps_and_fast_rolls_are_not_lost() {
    let on_move = |_: &PointerData| {};
    let (board, _rig) = common::board();
    board.initialize_trackball(&on_move, 10).await.unwrap();
    let dispatcher = board.interrupts();
    let at_us = Instant::from_micros;

    // A tap released 1.5 ms after the press.
    assert_eq!(
        dispatcher.on_edge_at(pins::TRACKBALL_BUTTON, PinState::Low, at_us(0)),
        EdgeOutcome::Queued
    );
    assert_eq!(
        dispatcher.on_edge_at(pins::TRACKBALL_BUTTON, PinState::High, at_us(1_500)),
        EdgeOutcome::Queued
    );
    // Five roller steps 1 ms apart.
    let outcomes: Vec<EdgeOutcome> = (0..5u64)
        .map(|i| {
            let at = at_us(2_000 + i * 1_000);
            dispatcher.on_edge_at(pins::TRACKBALL_RIGHT, PinState::Low, at)
        })
        .collect();
    assert_eq!(outcomes, vec![EdgeOutcome::Queued; 5]);
    assert_eq!(dispatcher.process_pending(&board).await, Ok(7));

    let pointer = board.trackball_data();
    assert_eq!(pointer.x, 50);
    assert!(!pointer.left_pressed, "release after a short tap is delivered");
    assert_eq!(dispatcher.filtered_events(), 0);
}

#[tokio::test]
async fn negative_sensitivity_inverts_the_trackball() {
    let on_move = |_: &PointerData| {};
    let (board, _rig) = common::board();
    board.initialize_trackball(&on_move, -10).await.unwrap();
    assert_eq!(board.trackball_sensitivity(), -10);
    let dispatcher = board.interrupts();

    // Left and up move the pointer right and down.
    dispatcher.on_edge_at(pins::TRACKBALL_LEFT, PinState::Low, at_ms(0));
    dispatcher.on_edge_at(pins::TRACKBALL_LEFT, PinState::Low, at_ms(10));
    dispatcher.on_edge_at(pins::TRACKBALL_UP, PinState::Low, at_ms(20));
    dispatcher.process_pending(&board).await.unwrap();
    assert_eq!((board.trackball_data().x, board.trackball_data().y), (20, 10));

    dispatcher.on_edge_at(pins::TRACKBALL_DOWN, PinState::Low, at_ms(30));
    dispatcher.process_pending(&board).await.unwrap();
    assert_eq!(board.trackball_data().y, 0);
}

#[tokio::test]
async fn trackball_rolls_back_on_a_failed_line() {
    let on_move = |_: &PointerData| {};
    let (board, rig) = common::board();
    rig.gpio.fail_on(pins::TRACKBALL_LEFT);

    assert_eq!(
        board.initialize_trackball(&on_move, 10).await,
        Err(BoardError::Interrupt(InterruptError::ClaimFailed(
            pins::TRACKBALL_LEFT
        )))
    );
    assert!(board.interrupts().registered_pins().is_empty());
    assert!(rig.gpio.enabled_pins().is_empty());
}

#[tokio::test]
async fn keyboard_polling_delivers_keys() {
    let keys = Mutex::new(Vec::new());
    let on_key = |key: u8| keys.lock().unwrap().push(key);
    let (board, rig) = common::board();

    assert_eq!(
        board.poll_keyboard().await,
        Err(BoardError::NotInitialized(Subsystem::Keyboard))
    );
    board
        .initialize_keyboard(KeyboardConfig::default(), &on_key)
        .await
        .unwrap();
    assert!(!board.interrupts().is_registered(pins::KEYBOARD_INTERRUPT));

    rig.keyboard.press(b"hi");
    let wait = async {
        while keys.lock().unwrap().len() < 2 {
            Timer::after(Duration::from_millis(1)).await;
        }
    };
    if let Either::First(result) = select(board.run_keyboard(), wait).await {
        panic!("keyboard task stopped: {result:?}");
    }
    assert_eq!(*keys.lock().unwrap(), b"hi".to_vec());
    assert_eq!(board.poll_keyboard().await, Ok(None));
}

#[tokio::test]
async fn keyboard_interrupt_mode_uses_gpio_46() {
    let keys = Mutex::new(Vec::new());
    let on_key = |key: u8| keys.lock().unwrap().push(key);
    let (board, rig) = common::board();

    board
        .initialize_keyboard(
            KeyboardConfig {
                mode: KeyboardMode::Interrupt,
            },
            &on_key,
        )
        .await
        .unwrap();
    let registration = board
        .interrupts()
        .registration(pins::KEYBOARD_INTERRUPT)
        .unwrap();
    assert_eq!(registration.active_level, ActiveLevel::Low);
    assert_eq!(registration.trigger, InterruptTrigger::Falling);
    assert!(matches!(
        board.run_keyboard().await,
        Err(BoardError::InvalidConfig(_))
    ));

    rig.keyboard.press(b"q");
    board
        .interrupts()
        .on_edge_at(pins::KEYBOARD_INTERRUPT, PinState::Low, at_ms(0));
    board.interrupts().process_pending(&board).await.unwrap();
    assert_eq!(*keys.lock().unwrap(), vec![b'q']);
}

#[tokio::test]
async fn buttons_share_one_callback_keyed_by_id() {
    let presses = Mutex::new(Vec::new());
    let on_button = |id: u8, pressed: bool| presses.lock().unwrap().push((id, pressed));
    let (board, _rig) = common::board();

    assert!(matches!(
        board.register_button(PinInterruptConfig::new(9, InterruptSource::Touch), &on_button),
        Err(BoardError::InvalidConfig(_))
    ));
    let button = |pin, id| {
        PinInterruptConfig::new(pin, InterruptSource::Button(id))
            .active_level(ActiveLevel::Low)
            .trigger(InterruptTrigger::Any)
    };
    board.register_button(button(9, 7), &on_button).unwrap();
    board.register_button(button(13, 8), &on_button).unwrap();

    board.interrupts().on_edge_at(9, PinState::Low, at_ms(0));
    board.interrupts().on_edge_at(13, PinState::Low, at_ms(1));
    board.interrupts().on_edge_at(9, PinState::High, at_ms(2));
    board.interrupts().process_pending(&board).await.unwrap();

    assert_eq!(
        *presses.lock().unwrap(),
        vec![(7, true), (8, true), (7, false)]
    );
}

#[tokio::test]
async fn dispatcher_task_serves_the_board() {
    let touches = Mutex::new(0u32);
    let on_touch = |_: &TouchpadData| *touches.lock().unwrap() += 1;
    let (board, rig) = common::board();
    board.initialize_touch(&on_touch).await.unwrap();

    let feed = async {
        for ms in 0..3 {
            rig.touch.push_sample(TouchpadData {
                num_touch_points: 1,
                ..TouchpadData::default()
            });
            board
                .interrupts()
                .on_edge_at(pins::TOUCH_INTERRUPT, PinState::High, at_ms(ms));
            Timer::after(Duration::from_millis(1)).await;
        }
        while *touches.lock().unwrap() < 3 {
            Timer::after(Duration::from_millis(1)).await;
        }
    };
    if let Either::First(result) = select(board.run_interrupts(), feed).await {
        panic!("dispatcher stopped: {result:?}");
    }
    assert_eq!(rig.touch.reads(), 3);
}

// ---------------------------------------------------------------------------
// Sound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn audio_requires_initialization() {
    let (board, _rig) = common::board();

    assert_eq!(
        board.play_audio(&[0; 4]).await,
        Err(BoardError::Audio(AudioError::NotInitialized))
    );
    assert_eq!(board.volume().get(), 50);

    board.initialize_sound(SoundConfig::default()).await.unwrap();
    assert_eq!(board.audio_sample_rate(), 48_000);
    assert_eq!(board.audio_buffer_size(), playback::audio_buffer_size(48_000));
    assert_eq!(
        board.set_audio_sample_rate(7_000).await,
        Err(BoardError::Audio(AudioError::UnsupportedSampleRate(7_000)))
    );

    board.mute(true);
    assert!(board.is_muted());
}

// ---------------------------------------------------------------------------
// Power
// ---------------------------------------------------------------------------

#[test]
fn interrupt_task_outranks_audio() {
    let audio = SoundConfig::default().task;
    assert_eq!(audio, TaskConfig::AUDIO);
    assert_eq!(audio.core_id, Some(1));
    assert_eq!(TaskConfig::INTERRUPTS.name, "t-deck interrupts");
    assert!(TaskConfig::INTERRUPTS.priority > audio.priority);
    assert_eq!(TaskConfig::INTERRUPTS.core_id, None);
}

#[test]
fn peripheral_rail_is_on_after_construction() {
    let (board, rig) = common::board();
    assert!(board.peripheral_power());
    assert!(rig.power.is_high());

    board.set_peripheral_power(false).unwrap();
    assert!(!board.peripheral_power());
    assert!(!rig.power.is_high());
}
