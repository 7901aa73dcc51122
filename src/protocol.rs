//! Decode worker wire format
//!
//! Messages crossing the worker boundary are plain data: serde-serializable
//! so they can be logged or replayed as JSON, and made of owned buffers so
//! they move across the channel without copying.
//!
//! Request:  `{ "id": 7, "url": "assets/puzzles/seated-cupid/seated-cupid.glb" }`
//! Success:  `{ "id": 7, "response": { "geometries": [...], "texture": {...} } }`
//! Failure:  `{ "id": 7, "response": { "error": "..." } }`

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::geometry::{BufferAttribute, BufferGeometry, TypedArray};
use crate::scene::{Mapping, PixelFormat, Sampler};

/// Identifies one model request for its whole lifetime
pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: RequestId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub id: RequestId,
    pub response: WorkerResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    Decoded {
        geometries: Vec<ShallowGeometry>,
        texture: TextureDescriptor,
    },
    Failed {
        error: String,
    },
}

impl WorkerResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        WorkerResponse::Failed { error: error.into() }
    }
}

// =============================================================================
// Shallow geometry
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShallowAttribute {
    pub array: TypedArray,
    pub item_size: usize,
    #[serde(default)]
    pub normalized: bool,
}

impl ShallowAttribute {
    pub fn new(array: TypedArray, item_size: usize) -> Self {
        Self {
            array,
            item_size,
            normalized: false,
        }
    }

    fn check_shape(&self, what: &str) -> Result<usize, AssetError> {
        if self.item_size == 0 {
            return Err(AssetError::TransferError(format!("{} has item size 0", what)));
        }
        let len = self.array.len();
        if len % self.item_size != 0 {
            return Err(AssetError::TransferError(format!(
                "{} length {} is not a multiple of item size {}",
                what, len, self.item_size
            )));
        }
        Ok(len / self.item_size)
    }
}

/// Plain-data description of one geometry's buffers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShallowGeometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<ShallowAttribute>,
    pub attributes: BTreeMap<String, ShallowAttribute>,
}

impl ShallowGeometry {
    /// Check every transfer invariant without building anything.
    /// Returns the vertex count.
    pub fn validate(&self) -> Result<usize, AssetError> {
        if self.attributes.is_empty() {
            return Err(AssetError::TransferError("geometry has no vertex attributes".into()));
        }

        let mut vertex_count: Option<(usize, &str)> = None;
        for (name, attr) in &self.attributes {
            let count = attr.check_shape(&format!("attribute '{}'", name))?;
            match vertex_count {
                None => vertex_count = Some((count, name.as_str())),
                Some((expected, first)) if expected != count => {
                    return Err(AssetError::TransferError(format!(
                        "attribute '{}' has {} vertices but '{}' has {}",
                        name, count, first, expected
                    )));
                }
                Some(_) => {}
            }
        }
        let vertex_count = vertex_count.map(|(c, _)| c).unwrap_or(0);

        if let Some(index) = &self.index {
            index.check_shape("index")?;
            if !index.array.is_index_type() {
                return Err(AssetError::TransferError(format!(
                    "index array has non-index type {}",
                    index.array.type_name()
                )));
            }
            for i in 0..index.array.len() {
                if let Some(v) = index.array.get_index(i) {
                    if v as usize >= vertex_count {
                        return Err(AssetError::TransferError(format!(
                            "index {} at position {} is out of range for {} vertices",
                            v, i, vertex_count
                        )));
                    }
                }
            }
        }

        Ok(vertex_count)
    }

    /// Serialize a geometry into its shallow form
    pub fn from_geometry(geometry: &BufferGeometry) -> Self {
        let to_shallow = |attr: &BufferAttribute| ShallowAttribute {
            array: attr.array.clone(),
            item_size: attr.item_size,
            normalized: attr.normalized,
        };
        Self {
            index: geometry.index().map(to_shallow),
            attributes: geometry
                .attributes()
                .map(|(name, attr)| (name.to_string(), to_shallow(attr)))
                .collect(),
        }
    }
}

impl TryFrom<ShallowGeometry> for BufferGeometry {
    type Error = AssetError;

    /// Validate, then move the arrays into a geometry. Names and item sizes
    /// are kept exactly.
    fn try_from(shallow: ShallowGeometry) -> Result<Self, Self::Error> {
        shallow.validate()?;
        Ok(shallow.into_geometry_unchecked())
    }
}

impl ShallowGeometry {
    /// Move the arrays into a geometry without checking them. Only for
    /// geometries that already passed [`validate`](Self::validate).
    pub(crate) fn into_geometry_unchecked(self) -> BufferGeometry {
        let mut geometry = BufferGeometry::new();
        if let Some(index) = self.index {
            geometry.set_index(BufferAttribute {
                array: index.array,
                item_size: index.item_size,
                normalized: false,
            });
        }
        for (name, attr) in self.attributes {
            geometry.set_attribute(
                name,
                BufferAttribute {
                    array: attr.array,
                    item_size: attr.item_size,
                    normalized: attr.normalized,
                },
            );
        }
        geometry
    }
}

// =============================================================================
// Texture transfer
// =============================================================================

/// RGBA8 raster moved from the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    #[serde(with = "base64_bytes")]
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureDescriptor {
    pub image: RasterImage,
    #[serde(default)]
    pub mapping: Mapping,
    #[serde(flatten)]
    pub sampler: Sampler,
    #[serde(default)]
    pub format: PixelFormat,
    #[serde(default = "default_anisotropy")]
    pub anisotropy: u8,
}

fn default_anisotropy() -> u8 {
    1
}

impl TextureDescriptor {
    pub fn new(image: RasterImage) -> Self {
        Self {
            image,
            mapping: Mapping::Uv,
            sampler: Sampler::default(),
            format: PixelFormat::Rgba8,
            anisotropy: default_anisotropy(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::{NORMAL, POSITION, UV};

    fn attr(values: Vec<f32>, item_size: usize) -> ShallowAttribute {
        ShallowAttribute::new(TypedArray::Float32(values), item_size)
    }

    fn reference_geometry() -> BufferGeometry {
        let mut geometry = BufferGeometry::new();
        geometry.set_attribute(
            POSITION,
            BufferAttribute::new(
                TypedArray::Float32(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]),
                3,
            ),
        );
        geometry.set_attribute(
            NORMAL,
            BufferAttribute::new(TypedArray::Float32([0.0, 0.0, 1.0].repeat(4)), 3),
        );
        geometry.set_attribute(
            UV,
            BufferAttribute::new(TypedArray::Float32(vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]), 2),
        );
        geometry.set_index(BufferAttribute::new(TypedArray::Uint16(vec![0, 1, 2, 0, 2, 3]), 1));
        geometry
    }

    #[test]
    fn test_reconstruct_matches_reference() {
        let reference = reference_geometry();
        let shallow = ShallowGeometry::from_geometry(&reference);
        let rebuilt = BufferGeometry::try_from(shallow).unwrap();

        assert_eq!(rebuilt, reference);
        let names: Vec<_> = rebuilt.attributes().map(|(n, a)| (n.to_string(), a.item_size)).collect();
        assert_eq!(
            names,
            vec![("normal".to_string(), 3), ("position".to_string(), 3), ("uv".to_string(), 2)]
        );
    }

    #[test]
    fn test_length_not_multiple_of_item_size() {
        let mut shallow = ShallowGeometry::default();
        shallow.attributes.insert(POSITION.into(), attr(vec![1.0, 2.0, 3.0], 4));

        let err = BufferGeometry::try_from(shallow).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferError);
        assert!(err.to_string().contains("length 3 is not a multiple of item size 4"));
    }

    #[test]
    fn test_inconsistent_vertex_counts() {
        let mut shallow = ShallowGeometry::default();
        shallow.attributes.insert(POSITION.into(), attr(vec![0.0; 9], 3));
        shallow.attributes.insert(UV.into(), attr(vec![0.0; 4], 2));

        let err = shallow.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferError);
    }

    #[test]
    fn test_zero_item_size() {
        let mut shallow = ShallowGeometry::default();
        shallow.attributes.insert(POSITION.into(), attr(vec![], 0));
        assert_eq!(shallow.validate().unwrap_err().kind(), ErrorKind::TransferError);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut shallow = ShallowGeometry::default();
        shallow.attributes.insert(POSITION.into(), attr(vec![0.0; 9], 3));
        shallow.index = Some(ShallowAttribute::new(TypedArray::Uint32(vec![0, 1, 3]), 1));
        assert_eq!(shallow.validate().unwrap_err().kind(), ErrorKind::TransferError);
    }

    #[test]
    fn test_float_index_rejected() {
        let mut shallow = ShallowGeometry::default();
        shallow.attributes.insert(POSITION.into(), attr(vec![0.0; 9], 3));
        shallow.index = Some(attr(vec![0.0, 1.0, 2.0], 1));
        assert_eq!(shallow.validate().unwrap_err().kind(), ErrorKind::TransferError);
    }

    #[test]
    fn test_malformed_message_from_json() {
        let json = r#"{
            "id": 3,
            "response": {
                "geometries": [
                    { "attributes": { "position": { "array": { "Float32": [1, 2, 3] }, "itemSize": 4 } } }
                ],
                "texture": { "image": { "width": 1, "height": 1, "pixels": "AAAAAA==" } }
            }
        }"#;
        let message: WorkerMessage = serde_json::from_str(json).unwrap();
        let WorkerResponse::Decoded { geometries, texture } = message.response else {
            panic!("expected a decoded response");
        };
        assert_eq!(texture.image.pixels, vec![0, 0, 0, 0]);
        assert_eq!(texture.anisotropy, 1);
        let err = geometries[0].validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferError);
    }

    #[test]
    fn test_failure_message_json() {
        let message: WorkerMessage =
            serde_json::from_str(r#"{ "id": 1, "response": { "error": "bad magic" } }"#).unwrap();
        assert_eq!(message.response, WorkerResponse::failed("bad magic"));
    }

    #[test]
    fn test_descriptor_json_uses_camel_case() {
        let descriptor = TextureDescriptor::new(RasterImage {
            width: 1,
            height: 1,
            pixels: vec![255, 0, 0, 255],
        });
        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("wrapS").is_some());
        assert!(json.get("magFilter").is_some());
        let back: TextureDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, descriptor);
    }
}
