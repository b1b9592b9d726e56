use baton_records::{DEFAULT_MAX_ELEMENTS, RecordError, RecordLayout, Scalar};
use serde::Deserialize;

/// Attributes a host hands to a step when it is built.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    /// Number of records in the shared buffer.
    pub size: usize,
    /// Base address of the shared buffer in this process.
    pub address: u64,
    #[serde(default = "defaults::fields")]
    pub fields: usize,
    /// Bytes between records; `None` means packed.
    #[serde(default)]
    pub stride_bytes: Option<usize>,
    /// Largest output the host can hold, in elements.
    #[serde(default = "defaults::max_elements")]
    pub max_elements: usize,
}

mod defaults {
    pub fn fields() -> usize {
        4
    }

    pub fn max_elements() -> usize {
        baton_records::DEFAULT_MAX_ELEMENTS
    }
}

impl StepConfig {
    /// Packed 4-field records at `address`.
    pub fn new(size: usize, address: u64) -> Self {
        Self {
            size,
            address,
            fields: 4,
            stride_bytes: None,
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }

    pub fn with_fields(mut self, fields: usize) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_stride(mut self, stride_bytes: usize) -> Self {
        self.stride_bytes = Some(stride_bytes);
        self
    }

    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }

    pub fn layout<T: Scalar>(&self) -> Result<RecordLayout, RecordError> {
        match self.stride_bytes {
            Some(stride) => RecordLayout::strided::<T>(self.fields, stride),
            None => RecordLayout::packed::<T>(self.fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_attributes_take_defaults() {
        let cfg: StepConfig = toml::from_str("size = 16\naddress = 4096\n").unwrap();
        assert_eq!(cfg, StepConfig::new(16, 4096));
        assert_eq!(cfg.layout::<f32>().unwrap(), RecordLayout::vec4::<f32>());
    }

    #[test]
    fn explicit_stride_builds_a_strided_layout() {
        let cfg: StepConfig =
            toml::from_str("size = 2\naddress = 64\nfields = 3\nstride_bytes = 16\n").unwrap();
        let layout = cfg.layout::<f32>().unwrap();
        assert_eq!((layout.fields(), layout.stride()), (3, 16));
    }

    #[test]
    fn zero_fields_is_rejected_at_layout_time() {
        let cfg = StepConfig::new(1, 64).with_fields(0);
        assert!(cfg.layout::<f64>().unwrap_err().is_argument());
    }
}
