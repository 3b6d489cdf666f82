use {
    crate::{
        exporter::Exporter,
        kms::{Change, DrmFramebuffer, PropBlob},
        renderer::{Renderer, RendererError},
        surface::{FrameSurface, MemId},
        utils::errorfmt::ErrorFmt,
        video::{
            dmabuf::DmaBuf,
            drm::{DRM_MODE_ATOMIC_ALLOW_MODESET, DrmFb},
        },
    },
    std::rc::{Rc, Weak},
};

/// A buffer bound to the plane.
pub(super) struct Scanout {
    mem: MemId,
    buf: DmaBuf,
    fb: DrmFramebuffer,
    surface: Weak<FrameSurface>,
}

impl Scanout {
    pub(super) fn fb(&self) -> DrmFb {
        self.fb.id()
    }

    /// Removes the framebuffer and hands the buffer back to the exporter.
    pub(super) fn release(self, exporter: &dyn Exporter) {
        let Scanout {
            mem,
            buf,
            fb,
            surface,
        } = self;
        drop(fb);
        exporter.release(mem, buf);
        if let Some(surface) = surface.upgrade() {
            surface.unlock();
        }
    }
}

impl Renderer {
    /// Displays `surface` on the plane.
    ///
    /// The previously displayed buffer is released only after the new one has been
    /// committed. If the commit fails, the previous buffer stays on screen.
    pub fn render(&mut self, surface: &Rc<FrameSurface>) -> Result<(), RendererError> {
        if self.config.hdr {
            self.update_hdr(surface);
        }
        let buf = self
            .exporter
            .acquire(surface.mem)
            .map_err(RendererError::Export)?;
        let fb = match DrmFramebuffer::new(&self.kms, &buf) {
            Ok(fb) => fb,
            Err(e) => {
                self.exporter.release(surface.mem, buf);
                return Err(RendererError::Present(e));
            }
        };
        let mode_blob = match self.commit_frame(surface, &fb) {
            Ok(b) => b,
            Err(e) => {
                drop(fb);
                self.exporter.release(surface.mem, buf);
                return Err(e);
            }
        };
        if let Some(blob) = mode_blob {
            self.mode_blob = self.hdr.adopt_mode_blob(blob);
            self.needs_modeset = false;
        }
        surface.lock();
        let previous = self.scanout.replace(Scanout {
            mem: surface.mem,
            buf,
            fb,
            surface: Rc::downgrade(surface),
        });
        if let Some(previous) = previous {
            previous.release(&*self.exporter);
        }
        self.current = Rc::downgrade(surface);
        Ok(())
    }

    fn update_hdr(&mut self, surface: &FrameSurface) {
        let Err(e) = self.send_hdr(surface, true) else {
            return;
        };
        match e {
            // logged once when the property was looked up
            RendererError::PropertyNotFound(_) => {}
            RendererError::MasterAcquisitionDegraded => {
                if self.warn.first("hdr-without-master") {
                    log::warn!("Cannot signal HDR metadata without DRM master");
                }
            }
            e => log::error!("Could not update HDR metadata: {}", ErrorFmt(e)),
        }
    }

    /// Commits `fb` to the plane. Returns the new mode blob if a modeset was performed.
    fn commit_frame(
        &self,
        surface: &FrameSurface,
        fb: &DrmFramebuffer,
    ) -> Result<Option<PropBlob>, RendererError> {
        let pipeline = &self.pipeline;
        let props = &self.props;
        let modeset = self.needs_modeset && self.master.is_master();
        let mut change = Change::new(&self.kms);
        let mut flags = 0;
        let mut mode_blob = None;
        if modeset {
            let connector_crtc = props.connector.id("CRTC_ID")?;
            let mode_id = props.crtc.id("MODE_ID")?;
            let active = props.crtc.id("ACTIVE")?;
            let blob = PropBlob::new(&self.kms, &self.mode.to_raw())
                .map_err(RendererError::Present)?;
            change.change_object(pipeline.connector, |c| {
                c.change(connector_crtc, pipeline.crtc.0 as u64);
            });
            change.change_object(pipeline.crtc, |c| {
                c.change(mode_id, blob.id().0 as u64);
                c.change(active, 1);
            });
            mode_blob = Some(blob);
            flags |= DRM_MODE_ATOMIC_ALLOW_MODESET;
        }
        let plane = &props.plane;
        let ids = [
            plane.id("FB_ID")?,
            plane.id("CRTC_ID")?,
            plane.id("SRC_X")?,
            plane.id("SRC_Y")?,
            plane.id("SRC_W")?,
            plane.id("SRC_H")?,
            plane.id("CRTC_X")?,
            plane.id("CRTC_Y")?,
            plane.id("CRTC_W")?,
            plane.id("CRTC_H")?,
        ];
        let values = [
            fb.id().0 as u64,
            pipeline.crtc.0 as u64,
            0,
            0,
            (surface.width as u64) << 16,
            (surface.height as u64) << 16,
            0,
            0,
            self.mode.hdisplay as u64,
            self.mode.vdisplay as u64,
        ];
        change.change_object(pipeline.plane, |c| {
            for (id, value) in ids.into_iter().zip(values) {
                c.change(id, value);
            }
        });
        change.commit(flags).map_err(RendererError::Present)?;
        Ok(mode_blob)
    }
}
