//! Importer-neutral scene graph.
//!
//! Both importers in [`crate::resources`] translate their file format into a
//! [`Scene`]: a flat list of meshes and materials plus a node tree whose nodes
//! reference meshes by index. The model loader only ever walks this structure.

use std::collections::HashMap;

/// Material slot a texture reference was found in, named after the usual
/// importer texture categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialSlot {
    Diffuse,
    Specular,
    Ambient,
    Emissive,
    Height,
    Normals,
    Lightmap,
    Shininess,
    Opacity,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMaterial {
    pub name: String,
    pub textures: HashMap<MaterialSlot, Vec<String>>,
}

impl SceneMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            textures: HashMap::new(),
        }
    }

    pub fn with_texture(mut self, slot: MaterialSlot, path: impl Into<String>) -> Self {
        self.add_texture(slot, path);
        self
    }

    pub fn add_texture(&mut self, slot: MaterialSlot, path: impl Into<String>) {
        self.textures.entry(slot).or_default().push(path.into());
    }

    /// Texture paths in `slot`, in declaration order.
    pub fn textures(&self, slot: MaterialSlot) -> &[String] {
        self.textures.get(&slot).map_or(&[], Vec::as_slice)
    }
}

/// One mesh as delivered by an importer. Optional attributes are `None` when
/// the file does not carry them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// First UV channel.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
    pub bitangents: Option<Vec<[f32; 3]>>,
    /// Polygons as vertex index lists. Triangles after triangulation.
    pub faces: Vec<Vec<u32>>,
    pub material: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_meshes(mut self, meshes: impl IntoIterator<Item = usize>) -> Self {
        self.meshes.extend(meshes);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first pre-order walk: a node is yielded before its children,
    /// children in their listed order.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a SceneNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a SceneNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Image bytes stored inside the model file, referenced as `*<index>`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub root: Option<SceneNode>,
    pub meshes: Vec<SceneMesh>,
    pub materials: Vec<SceneMaterial>,
    pub embedded: Vec<EmbeddedImage>,
    /// Set when the importer could not deliver the whole file.
    pub incomplete: bool,
}

impl Scene {
    /// Mesh indices in node visitation order.
    pub fn mesh_order(&self) -> Vec<usize> {
        self.root
            .iter()
            .flat_map(|root| root.pre_order())
            .flat_map(|node| node.meshes.iter().copied())
            .collect()
    }

    pub fn embedded(&self, reference: &str) -> Option<&EmbeddedImage> {
        let index: usize = reference.strip_prefix('*')?.parse().ok()?;
        self.embedded.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_order_visits_parent_before_children() {
        let root = SceneNode::new("root")
            .with_child(
                SceneNode::new("a")
                    .with_child(SceneNode::new("a1"))
                    .with_child(SceneNode::new("a2")),
            )
            .with_child(SceneNode::new("b"));
        let names: Vec<_> = root.pre_order().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["root", "a", "a1", "a2", "b"]);
    }

    #[test]
    fn mesh_order_concatenates_node_meshes() {
        let scene = Scene {
            root: Some(
                SceneNode::new("root")
                    .with_meshes([2])
                    .with_child(SceneNode::new("a").with_meshes([0, 3]))
                    .with_child(SceneNode::new("b").with_meshes([1])),
            ),
            ..Default::default()
        };
        assert_eq!(scene.mesh_order(), vec![2, 0, 3, 1]);
    }

    #[test]
    fn embedded_references_parse_index() {
        let scene = Scene {
            embedded: vec![EmbeddedImage {
                data: vec![1, 2, 3],
                mime_type: None,
            }],
            ..Default::default()
        };
        assert!(scene.embedded("*0").is_some());
        assert!(scene.embedded("*1").is_none());
        assert!(scene.embedded("0").is_none());
    }
}
