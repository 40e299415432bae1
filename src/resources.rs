//! Owning storage for GPU resources, addressed by typed handles.
//!
//! Entities never own meshes or materials. They hold a [`MeshId`] or
//! [`MaterialId`] into [`Resources`], so several platforms can share one
//! material and every buffer is released exactly once, when `Resources` drops.

use crate::material::Material;
use crate::mesh::Mesh;
use crate::renderer::ShaderProgram;
use crate::texture::Texture;

/// Handle to a mesh in [`Resources`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Handle to a 2D texture in [`Resources`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Handle to a shader program in [`Resources`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) usize);

/// Handle to a material in [`Resources`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

#[derive(Default)]
pub struct Resources {
    meshes: Vec<Mesh>,
    textures: Vec<Texture>,
    programs: Vec<ShaderProgram>,
    materials: Vec<Material>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        let idx = self.meshes.len();
        self.meshes.push(mesh);
        MeshId(idx)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        let idx = self.textures.len();
        self.textures.push(texture);
        TextureId(idx)
    }

    pub fn add_program(&mut self, program: ShaderProgram) -> ProgramId {
        let idx = self.programs.len();
        self.programs.push(program);
        ProgramId(idx)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let idx = self.materials.len();
        self.materials.push(material);
        MaterialId(idx)
    }

    pub fn mesh(&self, id: MeshId) -> &Mesh {
        &self.meshes[id.0]
    }

    pub fn texture(&self, id: TextureId) -> &Texture {
        &self.textures[id.0]
    }

    pub fn program(&self, id: ProgramId) -> &ShaderProgram {
        &self.programs[id.0]
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }
}
