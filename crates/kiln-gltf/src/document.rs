//! GLTF 2.0 document model.
//!
//! Optional members that the format gives a default for are skipped on
//! write when they hold that default. `extensions` and `extras` are kept as
//! raw JSON on every object; unknown top-level members of the document are
//! preserved in [`Document::other`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::base64;
use crate::glb::{MIME_APPLICATION_OCTET, MIME_GLTF_BUFFER, MIME_IMAGE_JPEG, MIME_IMAGE_PNG};
use crate::{Error, Result};

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Raw `extensions` and `extras` members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(flatten)]
    pub ext: Extensions,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            copyright: None,
            generator: None,
            min_version: None,
            ext: Extensions::default(),
        }
    }
}

/// A buffer and, once materialized, its bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(flatten)]
    pub ext: Extensions,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Buffer {
    /// A buffer holding `data`, to be stored in the GLB binary chunk.
    pub fn from_data(data: Vec<u8>) -> Self {
        Self {
            byte_length: data.len() as u32,
            data,
            ..Default::default()
        }
    }

    /// Whether the URI is an embedded base64 data URI.
    pub fn is_embedded_resource(&self) -> bool {
        self.uri.starts_with(MIME_APPLICATION_OCTET) || self.uri.starts_with(MIME_GLTF_BUFFER)
    }

    /// Replace the URI with `data` as an embedded data URI.
    pub fn set_embedded_resource(&mut self) {
        self.uri = format!("{MIME_APPLICATION_OCTET},{}", base64::encode(&self.data));
    }

    /// Decode an embedded data URI into `data`.
    pub(crate) fn materialize_embedded(&mut self) -> Result<()> {
        let start = if self.uri.starts_with(MIME_APPLICATION_OCTET) {
            MIME_APPLICATION_OCTET.len() + 1
        } else if self.uri.starts_with(MIME_GLTF_BUFFER) {
            MIME_GLTF_BUFFER.len() + 1
        } else {
            return Err(Error::new("Invalid buffer.uri value").with_value("malformed base64"));
        };

        let encoded = self.uri.get(start..).unwrap_or_default();
        // up to two padding bytes may be counted in the estimate
        let estimate = encoded.len() / 4 * 3;
        if estimate.saturating_sub(2) > self.byte_length as usize {
            return Err(Error::new("Invalid buffer.uri value").with_value("malformed base64"));
        }

        self.data = base64::decode(encoded)
            .map_err(|e| Error::new("Invalid buffer.uri value").with_value("malformed base64").with_source(e))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: u32,
    pub byte_length: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(flatten)]
    pub ext: Extensions,
}

/// Accessor component type, stored as its GL enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ComponentType {
    Byte = 5120,
    UnsignedByte = 5121,
    Short = 5122,
    UnsignedShort = 5123,
    UnsignedInt = 5125,
    Float = 5126,
}

impl TryFrom<u16> for ComponentType {
    type Error = String;

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            5120 => Self::Byte,
            5121 => Self::UnsignedByte,
            5122 => Self::Short,
            5123 => Self::UnsignedShort,
            5125 => Self::UnsignedInt,
            5126 => Self::Float,
            other => return Err(format!("Unknown accessor.componentType value : {other}")),
        })
    }
}

impl From<ComponentType> for u16 {
    fn from(value: ComponentType) -> Self {
        value as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    /// Number of components per element.
    pub const fn components(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndices {
    pub buffer_view: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: u32,
    pub component_type: ComponentType,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseValues {
    pub buffer_view: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: u32,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sparse {
    pub count: u32,
    pub indices: SparseIndices,
    pub values: SparseValues,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<u32>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: u32,
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub normalized: bool,
    pub count: u32,
    #[serde(rename = "type")]
    pub kind: AccessorType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub max: Vec<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub min: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<Sparse>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    #[serde(rename = "CUBICSPLINE")]
    CubicSpline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<u32>,
    pub path: String,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub sampler: u32,
    pub target: ChannelTarget,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationSampler {
    pub input: u32,
    pub output: u32,
    #[serde(default, skip_serializing_if = "is_default")]
    pub interpolation: Interpolation,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub channels: Vec<Channel>,
    pub samplers: Vec<AnimationSampler>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    Orthographic,
    Perspective,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orthographic {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perspective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f32>,
    pub yfov: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zfar: Option<f32>,
    pub znear: f32,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    #[serde(rename = "type")]
    pub kind: CameraType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orthographic: Option<Orthographic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<Perspective>,
    #[serde(flatten)]
    pub ext: Extensions,
}

impl Camera {
    /// Check that the projection matching `kind` is present.
    pub(crate) fn validate(&self) -> Result<()> {
        let (present, field) = match self.kind {
            CameraType::Orthographic => (self.orthographic.is_some(), "orthographic"),
            CameraType::Perspective => (self.perspective.is_some(), "perspective"),
        };
        if present {
            Ok(())
        } else {
            Err(Error::new("Required field not found").with_value(field))
        }
    }
}

/// An image, referenced by URI or buffer view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub ext: Extensions,
}

impl Image {
    /// Whether the URI is an embedded PNG or JPEG data URI.
    pub fn is_embedded_resource(&self) -> bool {
        self.uri.starts_with(MIME_IMAGE_PNG) || self.uri.starts_with(MIME_IMAGE_JPEG)
    }

    /// Decode the embedded image bytes.
    pub fn materialize_data(&self) -> Result<Vec<u8>> {
        let mime = if self.uri.starts_with(MIME_IMAGE_PNG) {
            MIME_IMAGE_PNG
        } else if self.uri.starts_with(MIME_IMAGE_JPEG) {
            MIME_IMAGE_JPEG
        } else {
            return Err(Error::new("Invalid image.uri value").with_value("not an embedded image"));
        };
        let encoded = self.uri.get(mime.len() + 1..).unwrap_or_default();
        base64::decode(encoded)
            .map_err(|e| Error::new("Invalid image.uri value").with_value("malformed base64").with_source(e))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTextureInfo {
    pub index: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcclusionTextureInfo {
    pub index: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tex_coord: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_factor: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<NormalTextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_factor: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub alpha_mode: AlphaMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub double_sided: bool,
    #[serde(flatten)]
    pub ext: Extensions,
}

/// Primitive topology; triangles unless stated.
pub const MODE_TRIANGLES: u32 = 4;

fn default_mode() -> u32 {
    MODE_TRIANGLES
}

fn is_triangles(mode: &u32) -> bool {
    *mode == MODE_TRIANGLES
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<u32>,
    #[serde(default = "default_mode", skip_serializing_if = "is_triangles")]
    pub mode: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<BTreeMap<String, u32>>,
    #[serde(flatten)]
    pub ext: Extensions,
}

impl Default for Primitive {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            indices: None,
            material: None,
            mode: MODE_TRIANGLES,
            targets: Vec::new(),
            ext: Extensions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<f32>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<f32>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_s: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_t: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<u32>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_bind_matrices: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<u32>,
    pub joints: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub ext: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<u32>,
    #[serde(flatten)]
    pub ext: Extensions,
}

/// A GLTF document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<Animation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cameras: Vec<Camera>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<Sampler>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skins: Vec<Skin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
    /// Unknown top-level members, kept as-is.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Document {
    /// Parse the JSON part of a document. Buffers are not materialized.
    pub fn from_json(json: &[u8]) -> Result<Self> {
        let document: Self = serde_json::from_slice(json)?;
        for camera in &document.cameras {
            camera.validate()?;
        }
        Ok(document)
    }

    /// Render the JSON part of a document.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_skipped() {
        let document = Document {
            buffers: vec![Buffer::from_data(vec![1, 2, 3])],
            meshes: vec![Mesh {
                primitives: vec![Primitive::default()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let json = document.to_json(false).unwrap();
        assert_eq!(
            json,
            r#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":3}],"meshes":[{"primitives":[{"attributes":{}}]}]}"#
        );
    }

    #[test]
    fn test_missing_required_field() {
        let err = Document::from_json(br#"{"buffers":[]}"#).unwrap_err();
        assert_eq!(err.reason(), "invalid glTF document");
        assert!(std::error::Error::source(&err).unwrap().to_string().contains("asset"));
    }

    #[test]
    fn test_unknown_enum_value() {
        let json = br#"{"asset":{"version":"2.0"},"materials":[{"alphaMode":"GLOW"}]}"#;
        let err = Document::from_json(json).unwrap_err();
        assert!(std::error::Error::source(&err).unwrap().to_string().contains("GLOW"));

        let json = br#"{"asset":{"version":"2.0"},"accessors":[{"componentType":1,"count":1,"type":"VEC3"}]}"#;
        let err = Document::from_json(json).unwrap_err();
        assert!(std::error::Error::source(&err)
            .unwrap()
            .to_string()
            .contains("componentType"));
    }

    #[test]
    fn test_camera_projection_required() {
        let json = br#"{"asset":{"version":"2.0"},"cameras":[{"type":"perspective"}]}"#;
        let err = Document::from_json(json).unwrap_err();
        assert_eq!(err.reason(), "Required field not found");
        assert_eq!(err.value(), Some("perspective"));
    }

    #[test]
    fn test_unknown_members_preserved() {
        let json = br#"{"asset":{"version":"2.0","extras":{"k":1}},"vendorThing":[1,2]}"#;
        let document = Document::from_json(json).unwrap();
        assert_eq!(document.other["vendorThing"], serde_json::json!([1, 2]));
        assert_eq!(document.asset.ext.extras, Some(serde_json::json!({"k": 1})));

        let again = Document::from_json(document.to_json(false).unwrap().as_bytes()).unwrap();
        assert_eq!(again, document);
    }

    #[test]
    fn test_embedded_buffer() {
        let mut buffer = Buffer::from_data(vec![9, 8, 7, 6, 5]);
        buffer.set_embedded_resource();
        assert!(buffer.is_embedded_resource());

        let mut loaded = Buffer {
            byte_length: 5,
            uri: buffer.uri.clone(),
            ..Default::default()
        };
        loaded.materialize_embedded().unwrap();
        assert_eq!(loaded.data, vec![9, 8, 7, 6, 5]);

        let mut short = Buffer {
            byte_length: 1,
            uri: buffer.uri,
            ..Default::default()
        };
        assert!(short.materialize_embedded().is_err());
    }

    #[test]
    fn test_image_marker() {
        let image = Image {
            uri: format!("{MIME_IMAGE_PNG},{}", base64::encode(b"\x89PNG")),
            ..Default::default()
        };
        assert!(image.is_embedded_resource());
        assert_eq!(image.materialize_data().unwrap(), b"\x89PNG");
        assert!(!Image::default().is_embedded_resource());
    }
}
