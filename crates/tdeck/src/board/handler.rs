//! Interrupt fan-out for [`TDeck`].

use crate::interrupts::{InterruptEvent, InterruptHandler, InterruptSource};
use crate::trackball;

use super::{BoardError, BoardTypes, Subsystem, TDeck};

use platform::TouchController;

impl<B: BoardTypes> TDeck<'_, B> {
    async fn on_touch(&self) -> Result<(), BoardError> {
        let sample = self
            .touch
            .lock()
            .await
            .read()
            .await
            .map_err(|_| BoardError::Device(Subsystem::Touch))?;
        if let Some(sample) = sample {
            self.touchpad.store(sample);
            if let Some(callback) = self.touch_callback.load() {
                callback(&sample);
            }
        }
        Ok(())
    }

    fn on_trackball(&self, event: &InterruptEvent) {
        let sensitivity = self.trackball_sensitivity();
        let pointer = self
            .pointer
            .update(|p| trackball::apply(p, event, sensitivity));
        if let Some(callback) = self.trackball_callback.load() {
            callback(&pointer);
        }
    }
}

impl<B: BoardTypes> InterruptHandler for TDeck<'_, B> {
    type Error = BoardError;

    async fn on_interrupt(&self, event: &InterruptEvent) -> Result<(), BoardError> {
        match event.source {
            InterruptSource::Touch => self.on_touch().await,
            InterruptSource::Keyboard => self.poll_keyboard().await.map(|_| ()),
            InterruptSource::TrackballUp
            | InterruptSource::TrackballDown
            | InterruptSource::TrackballLeft
            | InterruptSource::TrackballRight
            | InterruptSource::TrackballButton => {
                self.on_trackball(event);
                Ok(())
            }
            InterruptSource::Button(id) => {
                if let Some(callback) = self.button_callback.load() {
                    callback(id, event.active);
                }
                Ok(())
            }
        }
    }
}
