//! Buffer geometry
//!
//! A geometry is an optional index buffer plus a set of named vertex
//! attributes (`position`, `normal`, `uv`, ...). Each attribute is a flat
//! typed array read `item_size` components at a time.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::math::Vec3;

/// Name of the attribute holding vertex positions
pub const POSITION: &str = "position";
pub const NORMAL: &str = "normal";
pub const UV: &str = "uv";
pub const UV1: &str = "uv1";
pub const COLOR: &str = "color";

/// Flat typed storage for attribute and index data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedArray {
    Float32(Vec<f32>),
    Uint32(Vec<u32>),
    Uint16(Vec<u16>),
    Uint8(Vec<u8>),
    Int16(Vec<i16>),
    Int8(Vec<i8>),
}

impl TypedArray {
    pub fn len(&self) -> usize {
        match self {
            TypedArray::Float32(v) => v.len(),
            TypedArray::Uint32(v) => v.len(),
            TypedArray::Uint16(v) => v.len(),
            TypedArray::Uint8(v) => v.len(),
            TypedArray::Int16(v) => v.len(),
            TypedArray::Int8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type name, as it would appear in a log line
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedArray::Float32(_) => "Float32",
            TypedArray::Uint32(_) => "Uint32",
            TypedArray::Uint16(_) => "Uint16",
            TypedArray::Uint8(_) => "Uint8",
            TypedArray::Int16(_) => "Int16",
            TypedArray::Int8(_) => "Int8",
        }
    }

    /// Read element `i` widened to f32 (no normalization)
    pub fn get_f32(&self, i: usize) -> Option<f32> {
        match self {
            TypedArray::Float32(v) => v.get(i).copied(),
            TypedArray::Uint32(v) => v.get(i).map(|&x| x as f32),
            TypedArray::Uint16(v) => v.get(i).map(|&x| x as f32),
            TypedArray::Uint8(v) => v.get(i).map(|&x| x as f32),
            TypedArray::Int16(v) => v.get(i).map(|&x| x as f32),
            TypedArray::Int8(v) => v.get(i).map(|&x| x as f32),
        }
    }

    /// Read element `i` as an index. Float and signed arrays are not index
    /// types and always return `None`.
    pub fn get_index(&self, i: usize) -> Option<u32> {
        match self {
            TypedArray::Uint32(v) => v.get(i).copied(),
            TypedArray::Uint16(v) => v.get(i).map(|&x| x as u32),
            TypedArray::Uint8(v) => v.get(i).map(|&x| x as u32),
            _ => None,
        }
    }

    pub fn is_index_type(&self) -> bool {
        matches!(self, TypedArray::Uint32(_) | TypedArray::Uint16(_) | TypedArray::Uint8(_))
    }
}

/// A typed array viewed as `count()` items of `item_size` components
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAttribute {
    pub array: TypedArray,
    pub item_size: usize,
    pub normalized: bool,
}

impl BufferAttribute {
    pub fn new(array: TypedArray, item_size: usize) -> Self {
        Self {
            array,
            item_size,
            normalized: false,
        }
    }

    /// Number of items (vertices, for a vertex attribute)
    pub fn count(&self) -> usize {
        if self.item_size == 0 {
            return 0;
        }
        self.array.len() / self.item_size
    }

    /// Component `c` of item `i`. Components beyond `item_size` read as 0.
    pub fn get_component(&self, i: usize, c: usize) -> f32 {
        if c >= self.item_size {
            return 0.0;
        }
        self.array.get_f32(i * self.item_size + c).unwrap_or(0.0)
    }

    pub fn get_x(&self, i: usize) -> f32 {
        self.get_component(i, 0)
    }

    pub fn get_y(&self, i: usize) -> f32 {
        self.get_component(i, 1)
    }

    pub fn get_z(&self, i: usize) -> f32 {
        self.get_component(i, 2)
    }

    pub fn get_vec3(&self, i: usize) -> Vec3 {
        Vec3::new(self.get_x(i), self.get_y(i), self.get_z(i))
    }
}

/// Index buffer plus named vertex attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferGeometry {
    index: Option<BufferAttribute>,
    attributes: BTreeMap<String, BufferAttribute>,
}

impl BufferGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_index(&mut self, index: BufferAttribute) {
        self.index = Some(index);
    }

    pub fn index(&self) -> Option<&BufferAttribute> {
        self.index.as_ref()
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, attribute: BufferAttribute) {
        self.attributes.insert(name.into(), attribute);
    }

    pub fn attribute(&self, name: &str) -> Option<&BufferAttribute> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &BufferAttribute)> {
        self.attributes.iter().map(|(name, attr)| (name.as_str(), attr))
    }

    pub fn position(&self) -> Option<&BufferAttribute> {
        self.attribute(POSITION)
    }

    /// Number of vertices (taken from `position`, falling back to any attribute)
    pub fn vertex_count(&self) -> usize {
        self.position()
            .or_else(|| self.attributes.values().next())
            .map(|a| a.count())
            .unwrap_or(0)
    }

    /// Iterate local-space vertex positions
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        let attr = self.position();
        let count = attr.map(|a| a.count()).unwrap_or(0);
        (0..count).filter_map(move |i| attr.map(|a| a.get_vec3(i)))
    }

    /// Number of primitives' worth of indices (or vertices when non-indexed)
    pub fn draw_count(&self) -> usize {
        match &self.index {
            Some(index) => index.count(),
            None => self.vertex_count(),
        }
    }
}
