//! `TDeck` device registry.
//!
//! One explicitly constructed object owns every board resource: the
//! interrupt dispatcher, the shared SPI bus, the audio pipeline and one slot
//! per collaborator device. Each subsystem comes up through its own
//! `initialize_*` call. A failed initializer leaves the subsystem exactly as
//! it was, so it can be retried; a successful one is idempotent.
//!
//! ```text
//!             ┌──────────────────────── TDeck ───────────────────────┐
//!  GPIO trap ─┼─▶ InterruptDispatcher ──run(&tdeck)──▶ on_interrupt │
//!             │   SharedSpiBus ◀── LCD (CS 12, DC 11), uSD (CS 39)   │
//!  play() ────┼─▶ AudioPipeline ──run_audio(i2s)──▶ I2S             │
//!             │   LatestSample<TouchpadData>, LatestSample<Pointer>  │
//!             └──────────────────────────────────────────────────────┘
//! ```
//!
//! Hardware code places the board in a `static_cell::StaticCell` and hands
//! `&'static TDeck` to the dispatcher, audio and keyboard tasks.

mod config;
mod error;
mod handler;

pub use config::{
    DisplayConfig, KeyboardConfig, KeyboardMode, LcdConfig, SoundConfig, TaskConfig,
    DEFAULT_BRIGHTNESS, DEFAULT_KEYBOARD_POLL, DEFAULT_VOLUME, MAX_LCD_CLOCK_HZ,
};
pub use error::{BoardError, Subsystem};

use core::cell::RefCell;
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use platform::audio_types::VolumePercent;
use platform::config::SD_CLOCK_HZ;
use platform::{
    ActiveLevel, CardInfo, CardMount, GlitchFilter, I2sOutput, InterruptController,
    InterruptTrigger, KeyboardDevice, PointerData, Pull, Rotation, SdCardConfig, SpiMode,
    SpiPeripheral, TouchController, TouchpadData,
};
use playback::AudioPipeline;

use crate::bus::{AttachError, DeviceHandle, SharedSpiBus, SpiBusConfig, SpiDeviceConfig};
use crate::interrupts::{InterruptDispatcher, InterruptSource, PinInterruptConfig};
use crate::lcd::{self, Window};
use crate::pins;
use crate::sample::LatestSample;
use crate::touch::{self, TouchTransform};
use crate::trackball::DEFAULT_SENSITIVITY;

const MIB: u64 = 1_048_576;

/// Key-press callback: one key code per press.
pub type KeyCallback<'a> = &'a (dyn Fn(u8) + Sync);
/// Touch callback: the raw controller sample.
pub type TouchCallback<'a> = &'a (dyn Fn(&TouchpadData) + Sync);
/// Trackball callback: the updated pointer.
pub type TrackballCallback<'a> = &'a (dyn Fn(&PointerData) + Sync);
/// Button callback: button id and whether it is now pressed.
pub type ButtonCallback<'a> = &'a (dyn Fn(u8, bool) + Sync);

/// Concrete collaborator types of one board build.
pub trait BoardTypes {
    /// Raw mutex for every lock in the board
    type Mutex: RawMutex;
    /// SPI peripheral shared by the LCD and the uSD card
    type Spi: SpiPeripheral;
    /// Output pin type for chip/data selects and the power rail
    type Pin: OutputPin;
    /// GPIO interrupt controller
    type Gpio: InterruptController;
    /// Backlight PWM channel
    type Backlight: SetDutyCycle;
    /// Touch controller
    type Touch: TouchController;
    /// Keyboard co-processor
    type Keyboard: KeyboardDevice;
    /// Filesystem mount on the uSD card
    type Card: CardMount;
}

/// Peripherals handed to [`TDeck::new`].
pub struct BoardResources<B: BoardTypes> {
    /// SPI bus (unclaimed)
    pub spi: B::Spi,
    /// GPIO interrupt controller
    pub gpio: B::Gpio,
    /// LCD chip select (GPIO 12)
    pub lcd_cs: B::Pin,
    /// LCD data/command (GPIO 11)
    pub lcd_dc: B::Pin,
    /// uSD chip select (GPIO 39)
    pub sd_cs: B::Pin,
    /// Peripheral power enable (GPIO 10)
    pub peripheral_power: B::Pin,
    /// Backlight PWM (GPIO 42)
    pub backlight: B::Backlight,
    /// Touch controller
    pub touch: B::Touch,
    /// Keyboard
    pub keyboard: B::Keyboard,
    /// Card mount
    pub card: B::Card,
}

/// Board pins not currently lent to the bus arbiter.
struct ParkedPins<P> {
    lcd_cs: Option<P>,
    lcd_dc: Option<P>,
    sd_cs: Option<P>,
}

/// The T-Deck board.
pub struct TDeck<'a, B: BoardTypes> {
    interrupts: InterruptDispatcher<B::Mutex, B::Gpio>,
    spi: SharedSpiBus<B::Mutex, B::Spi, B::Pin>,
    audio: AudioPipeline<B::Mutex>,

    parked: BlockingMutex<B::Mutex, RefCell<ParkedPins<B::Pin>>>,
    power_pin: BlockingMutex<B::Mutex, RefCell<B::Pin>>,
    backlight: BlockingMutex<B::Mutex, RefCell<B::Backlight>>,
    touch: Mutex<B::Mutex, B::Touch>,
    keyboard: Mutex<B::Mutex, B::Keyboard>,
    card: Mutex<B::Mutex, B::Card>,
    /// Serializes initializers.
    init: Mutex<B::Mutex, ()>,

    lcd: LatestSample<B::Mutex, Option<DeviceHandle>>,
    sd: LatestSample<B::Mutex, Option<DeviceHandle>>,
    sdcard: LatestSample<B::Mutex, Option<CardInfo>>,
    display: LatestSample<B::Mutex, Option<DisplayConfig>>,
    rotation: LatestSample<B::Mutex, Rotation>,
    keyboard_config: LatestSample<B::Mutex, Option<KeyboardConfig>>,
    touch_ready: AtomicBool,
    trackball_ready: AtomicBool,

    touchpad: LatestSample<B::Mutex, TouchpadData>,
    pointer: LatestSample<B::Mutex, PointerData>,
    touch_transform: LatestSample<B::Mutex, TouchTransform>,

    key_callback: LatestSample<B::Mutex, Option<KeyCallback<'a>>>,
    touch_callback: LatestSample<B::Mutex, Option<TouchCallback<'a>>>,
    trackball_callback: LatestSample<B::Mutex, Option<TrackballCallback<'a>>>,
    button_callback: LatestSample<B::Mutex, Option<ButtonCallback<'a>>>,

    sensitivity: AtomicI16,
    brightness: AtomicU8,
    peripheral_power: AtomicBool,
}

impl<'a, B: BoardTypes> TDeck<'a, B> {
    /// Take ownership of the board peripherals and switch the peripheral
    /// power rail on.
    ///
    /// Volume starts at [`DEFAULT_VOLUME`], brightness at
    /// [`DEFAULT_BRIGHTNESS`]; no subsystem is initialized.
    pub fn new(resources: BoardResources<B>) -> Self {
        let BoardResources {
            spi,
            gpio,
            lcd_cs,
            lcd_dc,
            sd_cs,
            mut peripheral_power,
            backlight,
            touch,
            keyboard,
            card,
        } = resources;

        let powered = peripheral_power.set_high().is_ok();
        if !powered {
            warn!("peripheral power rail could not be enabled");
        }

        let audio = AudioPipeline::new();
        audio.set_volume(VolumePercent::new(DEFAULT_VOLUME));

        info!("{} board created", platform::config::board_title());

        Self {
            interrupts: InterruptDispatcher::new(gpio),
            spi: SharedSpiBus::new(spi),
            audio,
            parked: BlockingMutex::new(RefCell::new(ParkedPins {
                lcd_cs: Some(lcd_cs),
                lcd_dc: Some(lcd_dc),
                sd_cs: Some(sd_cs),
            })),
            power_pin: BlockingMutex::new(RefCell::new(peripheral_power)),
            backlight: BlockingMutex::new(RefCell::new(backlight)),
            touch: Mutex::new(touch),
            keyboard: Mutex::new(keyboard),
            card: Mutex::new(card),
            init: Mutex::new(()),
            lcd: LatestSample::new(None),
            sd: LatestSample::new(None),
            sdcard: LatestSample::new(None),
            display: LatestSample::new(None),
            rotation: LatestSample::new(Rotation::Landscape),
            keyboard_config: LatestSample::new(None),
            touch_ready: AtomicBool::new(false),
            trackball_ready: AtomicBool::new(false),
            touchpad: LatestSample::default(),
            pointer: LatestSample::default(),
            touch_transform: LatestSample::new(TouchTransform::T_DECK),
            key_callback: LatestSample::new(None),
            touch_callback: LatestSample::new(None),
            trackball_callback: LatestSample::new(None),
            button_callback: LatestSample::new(None),
            sensitivity: AtomicI16::new(DEFAULT_SENSITIVITY),
            brightness: AtomicU8::new(DEFAULT_BRIGHTNESS),
            peripheral_power: AtomicBool::new(powered),
        }
    }

    // -----------------------------------------------------------------------
    // uSD card
    // -----------------------------------------------------------------------

    /// Mount the uSD card.
    ///
    /// # Errors
    ///
    /// [`BoardError::InvalidConfig`] for a bad `config`, or
    /// [`BoardError::InitializationFailure`] when the bus or the mount fails.
    /// The card's chip select is handed back on failure so the call can be
    /// retried.
    pub async fn initialize_sdcard(&self, config: SdCardConfig) -> Result<(), BoardError> {
        let _init = self.init.lock().await;
        if self.sdcard.load().is_some() {
            warn!("sdcard already initialized");
            return Ok(());
        }
        config.validate().map_err(|reason| {
            warn!("sdcard config rejected: {}", reason);
            BoardError::InvalidConfig(reason)
        })?;
        self.claim_bus().await?;

        let cs = self
            .take_parked(|p| p.sd_cs.take())
            .ok_or(BoardError::InitializationFailure(Subsystem::SdCard))?;
        let handle = self
            .attach(SpiDeviceConfig {
                cs,
                dc: None,
                frequency: SD_CLOCK_HZ,
                mode: SpiMode::Mode0,
            })
            .await
            .map_err(|_| BoardError::InitializationFailure(Subsystem::SdCard))?;

        let mounted = {
            let mut device = self.spi.device(handle);
            self.card.lock().await.mount(&mut device, &config).await
        };
        match mounted {
            Ok(info) => {
                self.sd.store(Some(handle));
                self.sdcard.store(Some(info));
                info!("sdcard mounted: {} MiB", info.capacity_bytes / MIB);
                Ok(())
            }
            Err(_) => {
                warn!("sdcard mount failed");
                self.release(handle).await;
                Err(BoardError::InitializationFailure(Subsystem::SdCard))
            }
        }
    }

    /// Mounted card, `None` until [`Self::initialize_sdcard`] succeeds.
    pub fn sdcard(&self) -> Option<CardInfo> {
        self.sdcard.load()
    }

    /// The card as an `embedded-hal-async` SPI device on the shared bus.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotInitialized`] before the card is mounted.
    pub fn sdcard_device(
        &self,
    ) -> Result<crate::bus::BusDevice<'_, B::Mutex, B::Spi, B::Pin, 2>, BoardError> {
        let handle = self
            .sd
            .load()
            .ok_or(BoardError::NotInitialized(Subsystem::SdCard))?;
        Ok(self.spi.device(handle))
    }

    // -----------------------------------------------------------------------
    // Keyboard
    // -----------------------------------------------------------------------

    /// Probe the keyboard and install `on_key`.
    ///
    /// In [`KeyboardMode::Interrupt`] the keyboard interrupt line (GPIO 46)
    /// is registered; in polling mode the firmware runs
    /// [`Self::run_keyboard`].
    ///
    /// # Errors
    ///
    /// [`BoardError::InitializationFailure`] if the keyboard does not answer,
    /// or [`BoardError::Interrupt`] if GPIO 46 cannot be registered.
    pub async fn initialize_keyboard(
        &self,
        config: KeyboardConfig,
        on_key: KeyCallback<'a>,
    ) -> Result<(), BoardError> {
        let _init = self.init.lock().await;
        if self.keyboard_config.load().is_some() {
            warn!("keyboard already initialized");
            return Ok(());
        }
        self.keyboard.lock().await.init().await.map_err(|_| {
            warn!("keyboard did not respond");
            BoardError::InitializationFailure(Subsystem::Keyboard)
        })?;
        if config.mode == KeyboardMode::Interrupt {
            self.interrupts.register(
                PinInterruptConfig::new(pins::KEYBOARD_INTERRUPT, InterruptSource::Keyboard)
                    .active_level(ActiveLevel::Low)
                    .trigger(InterruptTrigger::Falling)
                    .pull(Pull::Up),
            )?;
        }
        self.key_callback.store(Some(on_key));
        self.keyboard_config.store(Some(config));
        info!("keyboard ready");
        Ok(())
    }

    /// Read one key and hand it to the key callback.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotInitialized`] or [`BoardError::Device`].
    pub async fn poll_keyboard(&self) -> Result<Option<u8>, BoardError> {
        if self.keyboard_config.load().is_none() {
            return Err(BoardError::NotInitialized(Subsystem::Keyboard));
        }
        let key = self
            .keyboard
            .lock()
            .await
            .read_key()
            .await
            .map_err(|_| BoardError::Device(Subsystem::Keyboard))?;
        if let (Some(key), Some(callback)) = (key, self.key_callback.load()) {
            callback(key);
        }
        Ok(key)
    }

    /// Keyboard polling task body.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotInitialized`] before [`Self::initialize_keyboard`],
    /// [`BoardError::InvalidConfig`] when the keyboard is interrupt driven.
    /// Read failures are logged and polling continues.
    pub async fn run_keyboard(&self) -> Result<Infallible, BoardError> {
        let config = self
            .keyboard_config
            .load()
            .ok_or(BoardError::NotInitialized(Subsystem::Keyboard))?;
        let KeyboardMode::Polling { interval } = config.mode else {
            return Err(BoardError::InvalidConfig("keyboard is interrupt driven"));
        };
        loop {
            if self.poll_keyboard().await.is_err() {
                warn!("keyboard read failed");
            }
            Timer::after(interval).await;
        }
    }

    // -----------------------------------------------------------------------
    // Sound
    // -----------------------------------------------------------------------

    /// Bring up the audio pipeline at `config.sample_rate`.
    ///
    /// The firmware then spawns [`Self::run_audio`] with the placement in
    /// `config.task`.
    ///
    /// # Errors
    ///
    /// [`BoardError::Audio`] for an unsupported sample rate.
    pub async fn initialize_sound(&self, config: SoundConfig) -> Result<(), BoardError> {
        let _init = self.init.lock().await;
        self.audio.initialize(config.sample_rate).await?;
        debug!(
            "audio task: {} prio {} stack {}",
            config.task.name,
            config.task.priority,
            config.task.stack_size_bytes
        );
        Ok(())
    }

    /// Audio output task body.
    ///
    /// # Errors
    ///
    /// [`BoardError::Audio`] if another output task is running.
    pub async fn run_audio<O: I2sOutput>(&self, output: &mut O) -> Result<Infallible, BoardError> {
        Ok(self.audio.run(output).await?)
    }

    /// Queue PCM bytes for playback; suspends while the queue is full.
    ///
    /// # Errors
    ///
    /// [`BoardError::Audio`] before [`Self::initialize_sound`].
    pub async fn play_audio(&self, data: &[u8]) -> Result<(), BoardError> {
        Ok(self.audio.play(data).await?)
    }

    /// Current sample rate in Hz.
    pub fn audio_sample_rate(&self) -> u32 {
        self.audio.sample_rate()
    }

    /// Change the sample rate once queued audio has drained.
    ///
    /// # Errors
    ///
    /// [`BoardError::Audio`] for an unsupported rate or before
    /// [`Self::initialize_sound`].
    pub async fn set_audio_sample_rate(&self, sample_rate: u32) -> Result<(), BoardError> {
        Ok(self.audio.set_sample_rate(sample_rate).await?)
    }

    /// Bytes per audio transfer at the current rate.
    pub fn audio_buffer_size(&self) -> usize {
        self.audio.audio_buffer_size()
    }

    /// Output volume.
    pub fn volume(&self) -> VolumePercent {
        self.audio.volume()
    }

    /// Set the output volume.
    pub fn set_volume(&self, volume: VolumePercent) {
        self.audio.set_volume(volume);
    }

    /// Mute or unmute the output.
    pub fn mute(&self, muted: bool) {
        self.audio.set_muted(muted);
    }

    /// Whether the output is muted.
    pub fn is_muted(&self) -> bool {
        self.audio.is_muted()
    }

    // -----------------------------------------------------------------------
    // LCD and display
    // -----------------------------------------------------------------------

    /// Attach the LCD to the shared bus, run the panel bring-up and switch
    /// the backlight on at the current brightness.
    ///
    /// # Errors
    ///
    /// [`BoardError::InvalidConfig`] or [`BoardError::InitializationFailure`].
    /// The LCD pins are handed back on failure.
    pub async fn initialize_lcd(&self, config: LcdConfig) -> Result<(), BoardError> {
        let _init = self.init.lock().await;
        if self.lcd.load().is_some() {
            warn!("lcd already initialized");
            return Ok(());
        }
        config.validate().map_err(BoardError::InvalidConfig)?;
        self.claim_bus().await?;

        let (cs, dc) = self
            .take_parked(|p| match (p.lcd_cs.take(), p.lcd_dc.take()) {
                (Some(cs), Some(dc)) => Some((cs, dc)),
                (cs, dc) => {
                    p.lcd_cs = cs;
                    p.lcd_dc = dc;
                    None
                }
            })
            .ok_or(BoardError::InitializationFailure(Subsystem::Lcd))?;
        let handle = self
            .attach(SpiDeviceConfig {
                cs,
                dc: Some(dc),
                frequency: config.clock_hz,
                mode: config.mode,
            })
            .await
            .map_err(|_| BoardError::InitializationFailure(Subsystem::Lcd))?;

        if lcd::bring_up(&self.spi, handle, self.rotation.load())
            .await
            .is_err()
        {
            warn!("lcd bring-up failed");
            self.release(handle).await;
            return Err(BoardError::InitializationFailure(Subsystem::Lcd));
        }
        self.lcd.store(Some(handle));
        if self.apply_brightness(self.brightness()).is_err() {
            warn!("backlight could not be switched on");
        }
        info!("lcd ready at {} Hz", config.clock_hz);
        Ok(())
    }

    /// Configure the display on top of an initialized LCD.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotInitialized`] without an LCD,
    /// [`BoardError::InvalidConfig`] for a bad pixel buffer size, or a bus
    /// error while applying the rotation.
    pub async fn initialize_display(&self, config: DisplayConfig) -> Result<(), BoardError> {
        let _init = self.init.lock().await;
        if self.display.load().is_some() {
            warn!("display already initialized");
            return Ok(());
        }
        let lcd = self.lcd_handle()?;
        config.validate().map_err(|reason| {
            warn!("display config rejected: {}", reason);
            BoardError::InvalidConfig(reason)
        })?;
        if config.rotation != self.rotation.load() {
            lcd::write_command(&self.spi, lcd, lcd::dcs::MADCTL, &[config.rotation.madctl()])
                .await?;
            self.rotation.store(config.rotation);
        }
        self.display.store(Some(config));
        info!(
            "display ready: {} pixel buffer, rotation {}",
            config.pixel_buffer_size,
            config.rotation.index()
        );
        Ok(())
    }

    /// Display configuration, once initialized.
    pub fn display_config(&self) -> Option<DisplayConfig> {
        self.display.load()
    }

    /// Current panel orientation.
    pub fn rotation(&self) -> Rotation {
        self.rotation.load()
    }

    /// Rotate the panel.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotInitialized`] without an LCD, or a bus error.
    pub async fn set_rotation(&self, rotation: Rotation) -> Result<(), BoardError> {
        let lcd = self.lcd_handle()?;
        lcd::write_command(&self.spi, lcd, lcd::dcs::MADCTL, &[rotation.madctl()]).await?;
        self.rotation.store(rotation);
        if let Some(display) = self.display.load() {
            self.display.store(Some(DisplayConfig { rotation, ..display }));
        }
        Ok(())
    }

    /// Send one LCD command with parameters.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotInitialized`] without an LCD, or a bus error.
    pub async fn write_command(&self, command: u8, params: &[u8]) -> Result<(), BoardError> {
        let lcd = self.lcd_handle()?;
        Ok(lcd::write_command(&self.spi, lcd, command, params).await?)
    }

    /// Write a `width` x `height` RGB565 block with its top-left corner at
    /// (`x`, `y`).
    ///
    /// # Errors
    ///
    /// [`BoardError::NotInitialized`] without an LCD,
    /// [`BoardError::InvalidConfig`] if the block leaves the panel or `data`
    /// has the wrong length, or a bus error.
    pub async fn write_lcd_frame(
        &self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        data: &[u8],
    ) -> Result<(), BoardError> {
        let lcd = self.lcd_handle()?;
        let window = Window::from_frame(x, y, width, height, self.rotation.load())
            .ok_or(BoardError::InvalidConfig("lcd window outside the panel"))?;
        Ok(lcd::write_window(&self.spi, lcd, window, data).await?)
    }

    /// Write RGB565 lines covering the inclusive rectangle
    /// (`xs`, `ys`) ..= (`xe`, `ye`).
    ///
    /// # Errors
    ///
    /// As [`Self::write_lcd_frame`].
    pub async fn write_lcd_lines(
        &self,
        xs: u16,
        ys: u16,
        xe: u16,
        ye: u16,
        data: &[u8],
    ) -> Result<(), BoardError> {
        let lcd = self.lcd_handle()?;
        let window = Window::new(xs, ys, xe, ye, self.rotation.load())
            .ok_or(BoardError::InvalidConfig("lcd window outside the panel"))?;
        Ok(lcd::write_window(&self.spi, lcd, window, data).await?)
    }

    /// Backlight brightness in percent.
    pub fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::Relaxed)
    }

    /// Set the backlight brightness, clamped to 100 %.
    ///
    /// Before the LCD is initialized the value is only stored and applied
    /// when the LCD comes up.
    ///
    /// # Errors
    ///
    /// [`BoardError::Device`] if the PWM channel rejects the duty cycle.
    pub fn set_brightness(&self, percent: u8) -> Result<(), BoardError> {
        let percent = percent.min(100);
        self.brightness.store(percent, Ordering::Relaxed);
        if self.lcd.load().is_some() {
            self.apply_brightness(percent)?;
        }
        Ok(())
    }

    fn apply_brightness(&self, percent: u8) -> Result<(), BoardError> {
        self.backlight.lock(|backlight| {
            backlight
                .borrow_mut()
                .set_duty_cycle_percent(percent)
                .map_err(|_| BoardError::Device(Subsystem::Backlight))
        })
    }

    fn lcd_handle(&self) -> Result<DeviceHandle, BoardError> {
        self.lcd
            .load()
            .ok_or(BoardError::NotInitialized(Subsystem::Lcd))
    }

    // -----------------------------------------------------------------------
    // Touch and trackball
    // -----------------------------------------------------------------------

    /// Probe the touch controller and register its interrupt (GPIO 16,
    /// rising edge, active high).
    ///
    /// Should follow [`Self::initialize_display`] so samples can be mapped
    /// into the active display's coordinate space; a warning is logged
    /// otherwise.
    ///
    /// # Errors
    ///
    /// [`BoardError::InitializationFailure`] if the controller does not
    /// answer, or [`BoardError::Interrupt`].
    pub async fn initialize_touch(&self, on_touch: TouchCallback<'a>) -> Result<(), BoardError> {
        let _init = self.init.lock().await;
        if self.touch_ready.load(Ordering::Acquire) {
            warn!("touch already initialized");
            return Ok(());
        }
        if self.display.load().is_none() {
            warn!("touch initialized before the display");
        }
        self.touch.lock().await.init().await.map_err(|_| {
            warn!("touch controller did not respond");
            BoardError::InitializationFailure(Subsystem::Touch)
        })?;
        self.interrupts
            .register(PinInterruptConfig::new(pins::TOUCH_INTERRUPT, InterruptSource::Touch))?;
        self.touch_callback.store(Some(on_touch));
        self.touch_ready.store(true, Ordering::Release);
        info!("touch ready");
        Ok(())
    }

    /// Register the five trackball lines and install `on_move`.
    ///
    /// Rollers fire on falling edges, the button on both edges; all lines
    /// are active low with pull-ups and the pin glitch filter. If any line
    /// fails, the lines registered so far are released again.
    ///
    /// # Errors
    ///
    /// [`BoardError::Interrupt`] from the failing registration.
    pub async fn initialize_trackball(
        &self,
        on_move: TrackballCallback<'a>,
        sensitivity: i16,
    ) -> Result<(), BoardError> {
        let _init = self.init.lock().await;
        if self.trackball_ready.load(Ordering::Acquire) {
            warn!("trackball already initialized");
            return Ok(());
        }
        let lines = [
            (pins::TRACKBALL_UP, InterruptSource::TrackballUp, InterruptTrigger::Falling),
            (pins::TRACKBALL_DOWN, InterruptSource::TrackballDown, InterruptTrigger::Falling),
            (pins::TRACKBALL_LEFT, InterruptSource::TrackballLeft, InterruptTrigger::Falling),
            (pins::TRACKBALL_RIGHT, InterruptSource::TrackballRight, InterruptTrigger::Falling),
            (pins::TRACKBALL_BUTTON, InterruptSource::TrackballButton, InterruptTrigger::Any),
        ];
        for (done, (pin, source, trigger)) in lines.iter().enumerate() {
            let config = PinInterruptConfig::new(*pin, *source)
                .active_level(ActiveLevel::Low)
                .trigger(*trigger)
                .pull(Pull::Up)
                .filter(GlitchFilter::Pin);
            if let Err(e) = self.interrupts.register(config) {
                warn!("trackball gpio {} failed, rolling back", *pin);
                for (registered, _, _) in lines.iter().take(done) {
                    if self.interrupts.deregister(*registered).is_err() {
                        warn!("trackball gpio {} rollback failed", *registered);
                    }
                }
                return Err(e.into());
            }
        }
        self.sensitivity.store(sensitivity, Ordering::Relaxed);
        self.trackball_callback.store(Some(on_move));
        self.trackball_ready.store(true, Ordering::Release);
        info!("trackball ready, sensitivity {}", sensitivity);
        Ok(())
    }

    /// Register an application button on `config.pin`.
    ///
    /// All buttons share `on_button`, which receives the id from
    /// [`InterruptSource::Button`] and the pressed state.
    ///
    /// # Errors
    ///
    /// [`BoardError::InvalidConfig`] unless `config.source` is a button, or
    /// [`BoardError::Interrupt`].
    pub fn register_button(
        &self,
        config: PinInterruptConfig,
        on_button: ButtonCallback<'a>,
    ) -> Result<(), BoardError> {
        if !matches!(config.source, InterruptSource::Button(_)) {
            return Err(BoardError::InvalidConfig("button source expected"));
        }
        self.interrupts.register(config)?;
        self.button_callback.store(Some(on_button));
        Ok(())
    }

    /// Latest touch sample as reported by the controller.
    pub fn touchpad_data(&self) -> TouchpadData {
        self.touchpad.load()
    }

    /// Map a touch sample into the current display orientation.
    pub fn touchpad_convert(&self, data: TouchpadData) -> TouchpadData {
        touch::convert(data, self.touch_transform.load(), self.rotation.load())
    }

    /// Latest trackball pointer.
    pub fn trackball_data(&self) -> PointerData {
        self.pointer.load()
    }

    /// Pixels per trackball edge; negative when the direction is inverted.
    pub fn trackball_sensitivity(&self) -> i16 {
        self.sensitivity.load(Ordering::Relaxed)
    }

    /// Set pixels per trackball edge. A negative value inverts both axes.
    pub fn set_trackball_sensitivity(&self, sensitivity: i16) {
        self.sensitivity.store(sensitivity, Ordering::Relaxed);
    }

    // -----------------------------------------------------------------------
    // Power and shared resources
    // -----------------------------------------------------------------------

    /// Whether the peripheral power rail is on.
    pub fn peripheral_power(&self) -> bool {
        self.peripheral_power.load(Ordering::Relaxed)
    }

    /// Switch the peripheral power rail.
    ///
    /// # Errors
    ///
    /// [`BoardError::Device`] if the enable pin cannot be driven.
    pub fn set_peripheral_power(&self, on: bool) -> Result<(), BoardError> {
        self.power_pin.lock(|pin| {
            let mut pin = pin.borrow_mut();
            let result = if on { pin.set_high() } else { pin.set_low() };
            result.map_err(|_| BoardError::Device(Subsystem::PeripheralPower))
        })?;
        self.peripheral_power.store(on, Ordering::Relaxed);
        Ok(())
    }

    /// The interrupt dispatcher.
    pub fn interrupts(&self) -> &InterruptDispatcher<B::Mutex, B::Gpio> {
        &self.interrupts
    }

    /// The shared SPI bus.
    pub fn spi(&self) -> &SharedSpiBus<B::Mutex, B::Spi, B::Pin> {
        &self.spi
    }

    /// The audio pipeline.
    pub fn audio(&self) -> &AudioPipeline<B::Mutex> {
        &self.audio
    }

    /// Interrupt dispatcher task body, delivering events to this board.
    ///
    /// Spawn it with [`TaskConfig::INTERRUPTS`], one priority above the
    /// audio task.
    ///
    /// # Errors
    ///
    /// [`BoardError::Interrupt`] if another dispatcher task is running.
    pub async fn run_interrupts(&self) -> Result<Infallible, BoardError> {
        Ok(self.interrupts.run(self).await?)
    }

    // -----------------------------------------------------------------------
    // Bus plumbing
    // -----------------------------------------------------------------------

    async fn claim_bus(&self) -> Result<(), BoardError> {
        self.spi
            .initialize(SpiBusConfig::default())
            .await
            .map_err(|_| BoardError::InitializationFailure(Subsystem::Spi))
    }

    fn take_parked<T>(&self, f: impl FnOnce(&mut ParkedPins<B::Pin>) -> Option<T>) -> Option<T> {
        self.parked.lock(|parked| f(&mut parked.borrow_mut()))
    }

    fn park(&self, config: SpiDeviceConfig<B::Pin>) {
        self.parked.lock(|parked| {
            let mut parked = parked.borrow_mut();
            match config.dc {
                Some(dc) => {
                    parked.lcd_cs = Some(config.cs);
                    parked.lcd_dc = Some(dc);
                }
                None => parked.sd_cs = Some(config.cs),
            }
        });
    }

    /// Attach a device, parking its pins again if the arbiter refuses it.
    async fn attach(&self, config: SpiDeviceConfig<B::Pin>) -> Result<DeviceHandle, BoardError> {
        self.spi
            .attach(config)
            .await
            .map_err(|AttachError { error, config }| {
                self.park(config);
                BoardError::Bus(error)
            })
    }

    /// Detach a device and park its pins.
    async fn release(&self, handle: DeviceHandle) {
        match self.spi.detach(handle).await {
            Ok(config) => self.park(config),
            Err(_) => error!("spi device {} vanished during release", handle.index()),
        }
    }
}
