use {
    crate::{
        kms::Kms,
        utils::errorfmt::ErrorFmt,
        video::drm::{DrmConnector, DrmCrtcInfo},
    },
    std::{rc::Rc, thread, time::Duration},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MasterState {
    /// The renderer may change the display configuration.
    Master,
    /// Another process holds master. Only plane updates are attempted.
    Degraded,
    /// Master has been dropped.
    Released,
}

pub struct MasterControl {
    kms: Rc<dyn Kms>,
    state: MasterState,
}

impl MasterControl {
    pub fn new(kms: &Rc<dyn Kms>) -> Self {
        Self {
            kms: kms.clone(),
            state: MasterState::Released,
        }
    }

    pub fn state(&self) -> MasterState {
        self.state
    }

    pub fn is_master(&self) -> bool {
        self.state == MasterState::Master
    }

    /// Tries to become master up to `attempts` times.
    pub fn set_master(&mut self, attempts: u32, interval: Duration) -> MasterState {
        if self.state == MasterState::Master {
            return self.state;
        }
        let attempts = attempts.max(1);
        let mut error = None;
        for attempt in 0..attempts {
            match self.kms.set_master() {
                Ok(()) => {
                    log::debug!("Became DRM master after {} attempt(s)", attempt + 1);
                    self.state = MasterState::Master;
                    return self.state;
                }
                Err(e) => error = Some(e),
            }
            if attempt + 1 < attempts {
                thread::sleep(interval);
            }
        }
        if let Some(e) = error {
            log::warn!(
                "Could not become DRM master, only plane updates will be attempted: {}",
                ErrorFmt(e)
            );
        }
        self.state = MasterState::Degraded;
        self.state
    }

    /// Drops master if it is held. Subsequent calls do nothing.
    pub fn drop_master(&mut self) {
        let held = self.state == MasterState::Master;
        self.state = MasterState::Released;
        if held && let Err(e) = self.kms.drop_master() {
            log::error!("{}", ErrorFmt(e));
        }
    }

    /// Reapplies the CRTC configuration that was active before the renderer started.
    pub fn restore(&self, saved: &DrmCrtcInfo, connector: DrmConnector) -> bool {
        if !self.is_master() {
            return false;
        }
        let all = [connector];
        let connectors: &[DrmConnector] = match saved.mode {
            Some(_) => &all,
            None => &[],
        };
        let res = self.kms.set_crtc(
            saved.crtc_id,
            saved.fb_id,
            saved.x,
            saved.y,
            connectors,
            saved.mode.as_ref(),
        );
        match res {
            Ok(()) => true,
            Err(e) => {
                log::error!("Could not restore the previous CRTC state: {}", ErrorFmt(e));
                false
            }
        }
    }
}
