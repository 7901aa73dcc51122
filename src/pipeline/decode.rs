//! glTF decoding (worker side)
//!
//! Parses a GLB (or glTF with embedded buffers), walks the default scene and
//! bakes every node's world transform into its primitives, so each decoded
//! geometry is already in model space. The worker ships these as shallow
//! geometries plus one RGBA8 raster; the direct loader reuses the same walk.

use std::sync::Arc;
use image::{DynamicImage, ImageBuffer};
use tracing::{debug, warn};

use crate::geometry::{BufferAttribute, BufferGeometry, TypedArray, COLOR, NORMAL, POSITION, UV, UV1};
use crate::math::{mat4_from_cols, mat4_mul, mat4_transform_point, mat4_transform_vector, Mat4, Vec3, MAT4_IDENTITY};
use crate::protocol::{RasterImage, ShallowGeometry, TextureDescriptor, WorkerResponse};
use crate::scene::{ColorSpace, MagFilter, Mapping, MinFilter, PixelFormat, Sampler, Texture, Wrapping};
use crate::storage::Storage;

/// Turns a model URL into a worker response. Runs on the decode worker.
pub trait Decoder: Send + 'static {
    fn decode(&mut self, url: &str) -> WorkerResponse;
}

impl<F> Decoder for F
where
    F: FnMut(&str) -> WorkerResponse + Send + 'static,
{
    fn decode(&mut self, url: &str) -> WorkerResponse {
        self(url)
    }
}

/// Default decoder: fetch through [`Storage`], decode with `gltf`
#[derive(Debug, Clone, Default)]
pub struct GltfDecoder {
    storage: Storage,
}

impl GltfDecoder {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn try_decode(&self, url: &str) -> Result<WorkerResponse, String> {
        let bytes = self.storage.fetch(url).map_err(|e| e.to_string())?;
        let scene = import_scene(&bytes)?;

        let texture = match scene.first_base_color_texture() {
            Some(texture) => texture_descriptor(&texture),
            None => {
                debug!(url, "no base colour texture, using a white raster");
                TextureDescriptor::new(RasterImage {
                    width: 1,
                    height: 1,
                    pixels: vec![255; 4],
                })
            }
        };

        let geometries = scene
            .primitives
            .iter()
            .map(|p| ShallowGeometry::from_geometry(&p.geometry))
            .collect();

        Ok(WorkerResponse::Decoded { geometries, texture })
    }
}

impl Decoder for GltfDecoder {
    fn decode(&mut self, url: &str) -> WorkerResponse {
        match self.try_decode(url) {
            Ok(response) => response,
            Err(e) => {
                warn!(url, "decode failed: {}", e);
                WorkerResponse::failed(e)
            }
        }
    }
}

fn texture_descriptor(texture: &Texture) -> TextureDescriptor {
    TextureDescriptor {
        image: RasterImage {
            width: texture.width(),
            height: texture.height(),
            pixels: texture.image.as_raw().clone(),
        },
        mapping: texture.mapping,
        sampler: texture.sampler,
        format: texture.format,
        anisotropy: texture.anisotropy,
    }
}

// =============================================================================
// Scene import
// =============================================================================

/// One glTF primitive with its node transform baked in
#[derive(Debug, Clone)]
pub(crate) struct ImportedPrimitive {
    pub name: Option<String>,
    pub geometry: BufferGeometry,
    pub material: Option<usize>,
}

/// glTF material reduced to what the scene graph carries
#[derive(Debug, Clone)]
pub(crate) struct ImportedMaterial {
    pub name: Option<String>,
    pub base_color: [f32; 4],
    pub texture: Option<Arc<Texture>>,
    pub double_sided: bool,
}

pub(crate) struct ImportedScene {
    pub primitives: Vec<ImportedPrimitive>,
    pub materials: Vec<ImportedMaterial>,
}

impl ImportedScene {
    /// The base colour texture of the first textured primitive, in draw order
    pub fn first_base_color_texture(&self) -> Option<Arc<Texture>> {
        self.primitives
            .iter()
            .filter_map(|p| p.material)
            .filter_map(|i| self.materials.get(i))
            .find_map(|m| m.texture.clone())
    }
}

pub(crate) fn import_scene(bytes: &[u8]) -> Result<ImportedScene, String> {
    let (document, buffers, images) = gltf::import_slice(bytes).map_err(|e| e.to_string())?;

    let textures: Vec<Option<Arc<Texture>>> = document
        .textures()
        .map(|texture| {
            let source = texture.source().index();
            let image = images.get(source)?;
            match convert_image(image) {
                Ok(rgba) => Some(Arc::new(Texture {
                    image: rgba,
                    mapping: Mapping::Uv,
                    sampler: convert_sampler(&texture.sampler()),
                    format: PixelFormat::Rgba8,
                    anisotropy: 1,
                    color_space: ColorSpace::Srgb,
                })),
                Err(e) => {
                    warn!(texture = texture.index(), "skipping texture: {}", e);
                    None
                }
            }
        })
        .collect();

    let materials = document
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            ImportedMaterial {
                name: material.name().map(str::to_string),
                base_color: pbr.base_color_factor(),
                texture: pbr
                    .base_color_texture()
                    .and_then(|info| textures.get(info.texture().index()).cloned().flatten()),
                double_sided: material.double_sided(),
            }
        })
        .collect();

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| "glTF file has no scene".to_string())?;

    let mut primitives = Vec::new();
    for node in scene.nodes() {
        walk_node(&node, &MAT4_IDENTITY, &buffers, &mut primitives)?;
    }
    if primitives.is_empty() {
        return Err("glTF scene has no meshes".to_string());
    }

    Ok(ImportedScene { primitives, materials })
}

fn walk_node(
    node: &gltf::Node,
    parent: &Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<ImportedPrimitive>,
) -> Result<(), String> {
    let world = mat4_mul(parent, &mat4_from_cols(node.transform().matrix()));

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                debug!(mesh = mesh.index(), "skipping non-triangle primitive");
                continue;
            }
            let geometry = read_primitive(&primitive, &world, buffers)?;
            out.push(ImportedPrimitive {
                name: mesh.name().or_else(|| node.name()).map(str::to_string),
                geometry,
                material: primitive.material().index(),
            });
        }
    }

    for child in node.children() {
        walk_node(&child, &world, buffers, out)?;
    }
    Ok(())
}

fn read_primitive(
    primitive: &gltf::Primitive,
    world: &Mat4,
    buffers: &[gltf::buffer::Data],
) -> Result<BufferGeometry, String> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

    let positions: Vec<f32> = reader
        .read_positions()
        .ok_or_else(|| "primitive has no positions".to_string())?
        .flat_map(|p| mat4_transform_point(world, Vec3::from(p)).to_array())
        .collect();

    let mut geometry = BufferGeometry::new();
    geometry.set_attribute(POSITION, BufferAttribute::new(TypedArray::Float32(positions), 3));

    if let Some(normals) = reader.read_normals() {
        let normals: Vec<f32> = normals
            .flat_map(|n| mat4_transform_vector(world, Vec3::from(n)).normalize().to_array())
            .collect();
        geometry.set_attribute(NORMAL, BufferAttribute::new(TypedArray::Float32(normals), 3));
    }

    for (set, name) in [(0, UV), (1, UV1)] {
        if let Some(coords) = reader.read_tex_coords(set) {
            let coords: Vec<f32> = coords.into_f32().flatten().collect();
            geometry.set_attribute(name, BufferAttribute::new(TypedArray::Float32(coords), 2));
        }
    }

    if let Some(colors) = reader.read_colors(0) {
        let colors: Vec<f32> = colors.into_rgba_f32().flatten().collect();
        geometry.set_attribute(COLOR, BufferAttribute::new(TypedArray::Float32(colors), 4));
    }

    if let Some(indices) = reader.read_indices() {
        let indices: Vec<u32> = indices.into_u32().collect();
        geometry.set_index(BufferAttribute::new(TypedArray::Uint32(indices), 1));
    }

    Ok(geometry)
}

// =============================================================================
// Images and samplers
// =============================================================================

fn convert_image(data: &gltf::image::Data) -> Result<image::RgbaImage, String> {
    use gltf::image::Format;

    let (w, h) = (data.width, data.height);
    let bytes = data.pixels.clone();
    let too_short = || format!("{:?} image data does not match {}x{}", data.format, w, h);

    let image = match data.format {
        Format::R8 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageLuma8),
        Format::R8G8 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageLumaA8),
        Format::R8G8B8 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageRgb8),
        Format::R8G8B8A8 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageRgba8),
        Format::R16 => ImageBuffer::from_raw(w, h, widen_u16(&bytes)).map(DynamicImage::ImageLuma16),
        Format::R16G16 => ImageBuffer::from_raw(w, h, widen_u16(&bytes)).map(DynamicImage::ImageLumaA16),
        Format::R16G16B16 => ImageBuffer::from_raw(w, h, widen_u16(&bytes)).map(DynamicImage::ImageRgb16),
        Format::R16G16B16A16 => {
            ImageBuffer::from_raw(w, h, widen_u16(&bytes)).map(DynamicImage::ImageRgba16)
        }
        Format::R32G32B32FLOAT => {
            ImageBuffer::from_raw(w, h, widen_f32(&bytes)).map(DynamicImage::ImageRgb32F)
        }
        Format::R32G32B32A32FLOAT => {
            ImageBuffer::from_raw(w, h, widen_f32(&bytes)).map(DynamicImage::ImageRgba32F)
        }
    };

    image.map(|img| img.to_rgba8()).ok_or_else(too_short)
}

fn widen_u16(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_ne_bytes([c[0], c[1]]))
        .collect()
}

fn widen_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn convert_sampler(sampler: &gltf::texture::Sampler) -> Sampler {
    use gltf::texture::{MagFilter as GMag, MinFilter as GMin, WrappingMode};

    let wrap = |mode: WrappingMode| match mode {
        WrappingMode::ClampToEdge => Wrapping::ClampToEdge,
        WrappingMode::MirroredRepeat => Wrapping::MirroredRepeat,
        WrappingMode::Repeat => Wrapping::Repeat,
    };

    Sampler {
        wrap_s: wrap(sampler.wrap_s()),
        wrap_t: wrap(sampler.wrap_t()),
        mag_filter: match sampler.mag_filter() {
            Some(GMag::Nearest) => MagFilter::Nearest,
            Some(GMag::Linear) | None => MagFilter::Linear,
        },
        min_filter: match sampler.min_filter() {
            Some(GMin::Nearest) => MinFilter::Nearest,
            Some(GMin::Linear) => MinFilter::Linear,
            Some(GMin::NearestMipmapNearest) => MinFilter::NearestMipmapNearest,
            Some(GMin::LinearMipmapNearest) => MinFilter::LinearMipmapNearest,
            Some(GMin::NearestMipmapLinear) => MinFilter::NearestMipmapLinear,
            Some(GMin::LinearMipmapLinear) | None => MinFilter::LinearMipmapLinear,
        },
    }
}

// =============================================================================
// Test fixtures
// =============================================================================

/// Minimal GLB builders shared by the pipeline tests
#[cfg(test)]
pub(crate) mod fixtures {
    use image::ImageEncoder;

    fn pad4(bytes: &mut Vec<u8>, fill: u8) {
        while bytes.len() % 4 != 0 {
            bytes.push(fill);
        }
    }

    fn png_2x2() -> Vec<u8> {
        let pixels: [u8; 16] = [
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ];
        let mut png = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png)
            .write_image(&pixels, 2, 2, image::ExtendedColorType::Rgba8)
            .unwrap();
        png
    }

    /// A GLB with one triangle mesh instanced by `mesh_nodes` nodes, each
    /// translated by `(i, 0, 0)`. With `textured`, the material carries an
    /// embedded 2x2 PNG base colour texture.
    pub fn triangle_glb(mesh_nodes: usize, textured: bool) -> Vec<u8> {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let normals: [f32; 9] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let uvs: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let indices: [u16; 3] = [0, 1, 2];

        let mut bin = Vec::new();
        bin.extend(positions.iter().flat_map(|f| f.to_le_bytes()));
        bin.extend(normals.iter().flat_map(|f| f.to_le_bytes()));
        bin.extend(uvs.iter().flat_map(|f| f.to_le_bytes()));
        bin.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
        pad4(&mut bin, 0);
        let image_offset = bin.len();
        let png = if textured { png_2x2() } else { Vec::new() };
        bin.extend(&png);
        pad4(&mut bin, 0);

        let nodes: Vec<_> = (0..mesh_nodes)
            .map(|i| serde_json::json!({ "mesh": 0, "translation": [i as f32, 0.0, 0.0] }))
            .collect();

        let mut json = serde_json::json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": (0..mesh_nodes).collect::<Vec<_>>() }],
            "nodes": nodes,
            "meshes": [{
                "name": "shard",
                "primitives": [{
                    "attributes": { "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 },
                    "indices": 3,
                    "material": 0
                }]
            }],
            "materials": [{ "pbrMetallicRoughness": { "baseColorFactor": [1.0, 1.0, 1.0, 1.0] } }],
            "buffers": [{ "byteLength": bin.len() }],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 72, "byteLength": 24 },
                { "buffer": 0, "byteOffset": 96, "byteLength": 6 },
                { "buffer": 0, "byteOffset": image_offset, "byteLength": png.len() }
            ],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
                { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" },
                { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2" },
                { "bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR" }
            ]
        });

        if textured {
            json["images"] = serde_json::json!([{ "bufferView": 4, "mimeType": "image/png" }]);
            json["samplers"] = serde_json::json!([{ "magFilter": 9728, "wrapS": 33071 }]);
            json["textures"] = serde_json::json!([{ "source": 0, "sampler": 0 }]);
            json["materials"][0]["pbrMetallicRoughness"]["baseColorTexture"] =
                serde_json::json!({ "index": 0 });
        } else {
            // Drop the empty image view
            if let Some(views) = json["bufferViews"].as_array_mut() {
                views.pop();
            }
        }

        let mut json_bytes = serde_json::to_vec(&json).unwrap();
        pad4(&mut json_bytes, b' ');

        let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend(b"glTF");
        glb.extend(2u32.to_le_bytes());
        glb.extend((total as u32).to_le_bytes());
        glb.extend((json_bytes.len() as u32).to_le_bytes());
        glb.extend(b"JSON");
        glb.extend(&json_bytes);
        glb.extend((bin.len() as u32).to_le_bytes());
        glb.extend(b"BIN\0");
        glb.extend(&bin);
        glb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn decoder_for(dir: &TempDir, file: &str, bytes: &[u8]) -> GltfDecoder {
        std::fs::write(dir.path().join(file), bytes).unwrap();
        GltfDecoder::new(Storage::with_root(dir.path()))
    }

    #[test]
    fn test_decode_textured_glb() {
        let dir = TempDir::new().unwrap();
        let mut decoder = decoder_for(&dir, "cupid.glb", &fixtures::triangle_glb(3, true));

        let WorkerResponse::Decoded { geometries, texture } = decoder.decode("cupid.glb") else {
            panic!("expected a decoded response");
        };
        assert_eq!(geometries.len(), 3);
        assert_eq!((texture.image.width, texture.image.height), (2, 2));
        assert_eq!(texture.image.pixels.len(), 16);
        assert_eq!(&texture.image.pixels[0..4], &[255, 0, 0, 255]);
        assert_eq!(texture.sampler.mag_filter, MagFilter::Nearest);
        assert_eq!(texture.sampler.wrap_s, Wrapping::ClampToEdge);

        for shallow in &geometries {
            assert_eq!(shallow.validate().unwrap(), 3);
            let names: Vec<_> = shallow.attributes.keys().map(String::as_str).collect();
            assert_eq!(names, vec![NORMAL, POSITION, UV]);
        }
    }

    #[test]
    fn test_node_transforms_are_baked() {
        let dir = TempDir::new().unwrap();
        let mut decoder = decoder_for(&dir, "pair.glb", &fixtures::triangle_glb(2, false));

        let WorkerResponse::Decoded { geometries, texture } = decoder.decode("pair.glb") else {
            panic!("expected a decoded response");
        };
        // Untextured models fall back to a white raster
        assert_eq!(texture.image.pixels, vec![255; 4]);

        let second = BufferGeometry::try_from(geometries[1].clone()).unwrap();
        let first_vertex = second.positions().next().unwrap();
        assert_eq!(first_vertex, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_decode_failures_are_reported() {
        let dir = TempDir::new().unwrap();
        let mut decoder = decoder_for(&dir, "junk.glb", b"definitely not a glb");

        assert!(matches!(decoder.decode("junk.glb"), WorkerResponse::Failed { .. }));
        assert!(matches!(decoder.decode("missing.glb"), WorkerResponse::Failed { .. }));
    }

    #[test]
    fn test_closure_decoder() {
        let mut decoder = |url: &str| WorkerResponse::failed(format!("no {}", url));
        assert_eq!(decoder.decode("a.glb"), WorkerResponse::failed("no a.glb"));
    }
}
