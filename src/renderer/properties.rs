use {
    crate::{
        kms::{Kms, get_properties},
        renderer::{RendererError, discovery::Pipeline},
        video::drm::{DrmError, DrmObject, DrmProperty, DrmPropertyDefinition},
    },
    ahash::{AHashMap, AHashSet},
    bstr::{BString, ByteSlice},
    std::cell::RefCell,
};

pub const HDR_OUTPUT_METADATA: &str = "HDR_OUTPUT_METADATA";
pub const COLORSPACE: &str = "Colorspace";

/// A snapshot of the properties of one object.
#[derive(Debug, Default)]
pub struct PropertyTable {
    props: AHashMap<BString, (DrmPropertyDefinition, u64)>,
}

impl PropertyTable {
    pub fn get<T: DrmObject>(kms: &dyn Kms, t: T) -> Result<Self, DrmError> {
        let mut props = AHashMap::new();
        for prop in get_properties(kms, t)? {
            let def = kms.get_property(prop.id)?;
            props.insert(def.name.clone(), (def, prop.value));
        }
        Ok(Self { props })
    }

    pub fn definition(&self, name: &str) -> Option<&DrmPropertyDefinition> {
        self.props.get(name.as_bytes().as_bstr()).map(|(def, _)| def)
    }

    pub fn id(&self, name: &'static str) -> Result<DrmProperty, RendererError> {
        match self.definition(name) {
            Some(def) => Ok(def.id),
            None => Err(RendererError::PropertyNotFound(name)),
        }
    }

    /// The value at the time the snapshot was taken.
    pub fn value(&self, name: &str) -> Option<u64> {
        self.props.get(name.as_bytes().as_bstr()).map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.props.contains_key(name.as_bytes().as_bstr())
    }

    pub fn names(&self) -> Vec<&BString> {
        let mut names: Vec<_> = self.props.keys().collect();
        names.sort();
        names
    }
}

pub struct PipelineProperties {
    pub connector: PropertyTable,
    pub crtc: PropertyTable,
    pub plane: PropertyTable,
}

impl PipelineProperties {
    pub fn get(kms: &dyn Kms, pipeline: &Pipeline) -> Result<Self, DrmError> {
        Ok(Self {
            connector: PropertyTable::get(kms, pipeline.connector)?,
            crtc: PropertyTable::get(kms, pipeline.crtc)?,
            plane: PropertyTable::get(kms, pipeline.plane)?,
        })
    }
}

/// Remembers which conditions have already been logged.
#[derive(Default)]
pub struct WarnOnce {
    warned: RefCell<AHashSet<&'static str>>,
}

impl WarnOnce {
    /// Returns `true` the first time it is called for `key`.
    pub fn first(&self, key: &'static str) -> bool {
        self.warned.borrow_mut().insert(key)
    }

    pub fn has_warned(&self, key: &str) -> bool {
        self.warned.borrow().contains(key)
    }
}
