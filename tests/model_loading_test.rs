use std::path::Path;

use flow_model::{
    LoaderConfig, Model, SlotMapping, TextureKind,
    data_structures::scene_graph::{MaterialSlot, Scene, SceneMaterial, SceneMesh, SceneNode},
    error::ImportError,
};

use crate::common::test_utils::{
    RecordingBackend, fixture_dir, png_bytes, write_file, write_png,
};

mod common;

fn triangle(name: &str, material: usize) -> SceneMesh {
    SceneMesh {
        name: name.to_string(),
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
        tex_coords: Some(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
        tangents: None,
        bitangents: None,
        faces: vec![vec![0, 1, 2]],
        material,
    }
}

fn scene(meshes: Vec<SceneMesh>, materials: Vec<SceneMaterial>, root: SceneNode) -> Scene {
    Scene {
        root: Some(root),
        meshes,
        materials,
        ..Default::default()
    }
}

#[test]
fn meshes_follow_node_pre_order() {
    let scene = scene(
        vec![triangle("a", 0), triangle("b", 0), triangle("c", 0)],
        vec![SceneMaterial::new("plain")],
        SceneNode::new("root")
            .with_meshes([2])
            .with_child(SceneNode::new("left").with_meshes([0]))
            .with_child(SceneNode::new("right").with_meshes([1, 0])),
    );
    let mut backend = RecordingBackend::new();
    let model =
        Model::from_scene(&mut backend, &scene, Path::new("."), &LoaderConfig::default()).unwrap();

    let names: Vec<&str> = model.meshes().iter().map(|m| m.gpu().label.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b", "a"]);
}

#[test]
fn shared_texture_is_loaded_once() {
    let dir = fixture_dir("dedupe");
    write_png(&dir, "tex/wood.png", [120, 80, 40]);
    let scene = scene(
        vec![triangle("first", 0), triangle("second", 1)],
        vec![
            SceneMaterial::new("a").with_texture(MaterialSlot::Diffuse, "tex/wood.png"),
            SceneMaterial::new("b").with_texture(MaterialSlot::Diffuse, "./tex\\wood.png"),
        ],
        SceneNode::new("root").with_meshes([0, 1]),
    );
    let mut backend = RecordingBackend::new();
    let model = Model::from_scene(&mut backend, &scene, &dir, &LoaderConfig::default()).unwrap();

    assert_eq!(backend.textures.len(), 1);
    assert_eq!(model.textures_loaded().len(), 1);
    let first = &model.meshes()[0].textures()[0];
    let second = &model.meshes()[1].textures()[0];
    assert_eq!(first.id(), second.id());
    assert_eq!(first.path, "tex/wood.png");
}

#[test]
fn first_kind_wins_when_a_file_fills_two_slots() {
    let dir = fixture_dir("two-slots");
    write_png(&dir, "shared.png", [10, 20, 30]);
    let scene = scene(
        vec![triangle("mesh", 0)],
        vec![SceneMaterial::new("m")
            .with_texture(MaterialSlot::Diffuse, "shared.png")
            .with_texture(MaterialSlot::Height, "shared.png")],
        SceneNode::new("root").with_meshes([0]),
    );
    let mut backend = RecordingBackend::new();
    let model = Model::from_scene(&mut backend, &scene, &dir, &LoaderConfig::default()).unwrap();

    assert_eq!(backend.textures.len(), 1);
    let kinds: Vec<TextureKind> = model.meshes()[0].textures().iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TextureKind::Diffuse, TextureKind::Diffuse]);
    let names: Vec<String> = model.meshes()[0]
        .texture_bindings()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["texture_diffuse1", "texture_diffuse2"]);
}

#[test]
fn missing_uvs_become_zero() {
    let mut mesh = triangle("no-uv", 0);
    mesh.tex_coords = None;
    let scene = scene(
        vec![mesh],
        vec![SceneMaterial::new("m")],
        SceneNode::new("root").with_meshes([0]),
    );
    let mut backend = RecordingBackend::new();
    let model =
        Model::from_scene(&mut backend, &scene, Path::new("."), &LoaderConfig::default()).unwrap();

    for vertex in model.meshes()[0].vertices() {
        assert_eq!(vertex.tex_coords, [0.0, 0.0]);
    }
}

#[test]
fn undecodable_textures_are_created_without_data() {
    let dir = fixture_dir("channels");
    image::GrayAlphaImage::from_pixel(2, 2, image::LumaA([128, 255]))
        .save(dir.join("gray_alpha.png"))
        .unwrap();
    let scene = scene(
        vec![triangle("mesh", 0)],
        vec![SceneMaterial::new("m")
            .with_texture(MaterialSlot::Diffuse, "gray_alpha.png")
            .with_texture(MaterialSlot::Specular, "missing.png")],
        SceneNode::new("root").with_meshes([0]),
    );
    let mut backend = RecordingBackend::new();
    let model = Model::from_scene(&mut backend, &scene, &dir, &LoaderConfig::default()).unwrap();

    assert_eq!(backend.textures.len(), 2);
    assert_eq!(backend.uploads_with_data(), 0);
    assert_eq!(model.meshes()[0].textures().len(), 2);
}

#[test]
fn gamma_only_applies_to_diffuse_textures() {
    let dir = fixture_dir("gamma");
    write_png(&dir, "albedo.png", [200, 100, 50]);
    write_png(&dir, "spec.png", [255, 255, 255]);
    let scene = scene(
        vec![triangle("mesh", 0)],
        vec![SceneMaterial::new("m")
            .with_texture(MaterialSlot::Diffuse, "albedo.png")
            .with_texture(MaterialSlot::Specular, "spec.png")],
        SceneNode::new("root").with_meshes([0]),
    );
    let config = LoaderConfig {
        gamma: true,
        ..Default::default()
    };
    let mut backend = RecordingBackend::new();
    let model = Model::from_scene(&mut backend, &scene, &dir, &config).unwrap();

    let srgb: Vec<bool> = model
        .textures_loaded()
        .iter()
        .map(|t| t.handle.0.image.as_ref().unwrap().srgb)
        .collect();
    assert_eq!(srgb, vec![true, false]);
    assert!(model.gamma_correction());
}

#[test]
fn incomplete_scenes_are_rejected() {
    let mut backend = RecordingBackend::new();
    let no_root = Scene::default();
    let err = Model::from_scene(&mut backend, &no_root, Path::new("."), &LoaderConfig::default())
        .unwrap_err();
    assert!(matches!(err, ImportError::IncompleteScene(_)));

    let mut flagged = scene(vec![], vec![], SceneNode::new("root"));
    flagged.incomplete = true;
    let err = Model::from_scene(&mut backend, &flagged, Path::new("."), &LoaderConfig::default())
        .unwrap_err();
    assert!(matches!(err, ImportError::IncompleteScene(_)));
}

#[test]
fn failed_load_returns_an_empty_model() {
    let dir = fixture_dir("missing");
    let mut backend = RecordingBackend::new();
    let model = Model::load(&mut backend, dir.join("nothing.obj"));
    assert!(model.is_empty());
    assert!(model.textures_loaded().is_empty());
    assert_eq!(model.directory(), dir.as_path());

    assert!(matches!(
        Model::try_load(&mut backend, dir.join("nothing.obj")),
        Err(ImportError::Io { .. })
    ));
}

const QUAD_OBJ: &str = "\
mtllib quad.mtl
o quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
usemtl brick
f 1/1/1 2/2/1 3/3/1 4/4/1
";

const QUAD_MTL: &str = "\
newmtl brick
Kd 1.0 1.0 1.0
map_Kd textures/diffuse.png
map_Ks textures/specular.png
map_Bump textures/bump.png
map_Ka textures/ambient.png
";

fn write_quad(name: &str) -> std::path::PathBuf {
    let dir = fixture_dir(name);
    for (texture, colour) in [
        ("textures/diffuse.png", [255, 0, 0]),
        ("textures/specular.png", [0, 255, 0]),
        ("textures/bump.png", [0, 0, 255]),
        ("textures/ambient.png", [9, 9, 9]),
    ] {
        write_png(&dir, texture, colour);
    }
    write_file(&dir, "quad.mtl", QUAD_MTL);
    write_file(&dir, "quad.obj", QUAD_OBJ)
}

#[test]
fn obj_quad_is_triangulated_with_flipped_uvs() {
    let path = write_quad("obj-geometry");
    let mut backend = RecordingBackend::new();
    let model = Model::try_load(&mut backend, &path).unwrap();

    assert_eq!(model.meshes().len(), 1);
    let mesh = &model.meshes()[0];
    assert_eq!(mesh.vertices().len(), 4);
    assert_eq!(mesh.indices().len(), 6);
    let first = mesh.vertices()[0];
    assert_eq!(first.tex_coords, [0.0, 1.0]);
    assert_eq!(first.normal, [0.0, 0.0, 1.0]);
    assert!((first.tangent[0] - 1.0).abs() < 1e-5);
}

#[test]
fn obj_legacy_slots_feed_normal_and_height() {
    let path = write_quad("obj-legacy");
    let mut backend = RecordingBackend::new();
    let model = Model::try_load(&mut backend, &path).unwrap();

    let textures: Vec<(TextureKind, &str)> = model.meshes()[0]
        .textures()
        .iter()
        .map(|t| (t.kind, t.path.as_str()))
        .collect();
    assert_eq!(
        textures,
        vec![
            (TextureKind::Diffuse, "textures/diffuse.png"),
            (TextureKind::Specular, "textures/specular.png"),
            (TextureKind::Normal, "textures/bump.png"),
            (TextureKind::Height, "textures/ambient.png"),
        ]
    );
    assert_eq!(backend.uploads_with_data(), 4);

    let info = model.info_string();
    assert!(info.starts_with("Loaded textures:\n"));
    assert!(info.contains(" - Type: texture_normal\n - Path: textures/bump.png\n"));
}

#[test]
fn obj_conventional_slots_use_bump_as_normal_map() {
    let path = write_quad("obj-conventional");
    let config = LoaderConfig {
        slot_mapping: SlotMapping::Conventional,
        ..Default::default()
    };
    let mut backend = RecordingBackend::new();
    let model = Model::try_load_with(&mut backend, &path, &config).unwrap();

    let kinds: Vec<(TextureKind, &str)> = model.meshes()[0]
        .textures()
        .iter()
        .map(|t| (t.kind, t.path.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (TextureKind::Diffuse, "textures/diffuse.png"),
            (TextureKind::Specular, "textures/specular.png"),
            (TextureKind::Normal, "textures/bump.png"),
        ]
    );
}

const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "name": "scene", "nodes": [0] }],
  "nodes": [{ "name": "triangle", "mesh": 0 }],
  "meshes": [{
    "name": "triangle",
    "primitives": [{ "attributes": { "POSITION": 0, "TEXCOORD_0": 1 }, "material": 0 }]
  }],
  "materials": [{
    "name": "painted",
    "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } },
    "normalTexture": { "index": 1 }
  }],
  "textures": [{ "source": 0 }, { "source": 1 }],
  "images": [{ "uri": "albedo.png" }, { "uri": "normal.png" }],
  "buffers": [{ "uri": "triangle.bin", "byteLength": 60 }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 24 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" }
  ]
}"#;

fn write_triangle_gltf(name: &str) -> std::path::PathBuf {
    let dir = fixture_dir(name);
    let floats: [f32; 15] = [
        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, // positions
        0.25, 0.75, 1.0, 0.75, 0.25, 0.0, // uvs
    ];
    let bytes: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();
    std::fs::write(dir.join("triangle.bin"), bytes).unwrap();
    write_png(&dir, "albedo.png", [200, 200, 200]);
    write_png(&dir, "normal.png", [128, 128, 255]);
    write_file(&dir, "triangle.gltf", TRIANGLE_GLTF)
}

#[test]
fn gltf_uvs_keep_their_top_left_origin() {
    let path = write_triangle_gltf("gltf-uv");
    let mut backend = RecordingBackend::new();
    let model = Model::try_load(&mut backend, &path).unwrap();

    let mesh = &model.meshes()[0];
    assert_eq!(mesh.vertices()[0].tex_coords, [0.25, 0.75]);
    assert_eq!(mesh.vertices()[2].tex_coords, [0.25, 0.0]);
    assert_eq!(mesh.indices(), &[0, 1, 2]);
}

#[test]
fn gltf_normal_textures_need_the_conventional_mapping() {
    let path = write_triangle_gltf("gltf-normals");
    let mut backend = RecordingBackend::new();
    let legacy = Model::try_load(&mut backend, &path).unwrap();
    let kinds: Vec<TextureKind> = legacy.meshes()[0].textures().iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TextureKind::Diffuse]);

    let config = LoaderConfig {
        slot_mapping: SlotMapping::Conventional,
        ..Default::default()
    };
    let conventional = Model::try_load_with(&mut backend, &path, &config).unwrap();
    let kinds: Vec<TextureKind> = conventional.meshes()[0]
        .textures()
        .iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(kinds, vec![TextureKind::Diffuse, TextureKind::Normal]);
}

#[test]
fn gltf_image_uris_are_percent_decoded() {
    let dir = fixture_dir("gltf-escaped");
    let floats: [f32; 15] = [
        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.25, 0.75, 1.0, 0.75, 0.25, 0.0,
    ];
    let bytes: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();
    std::fs::write(dir.join("triangle.bin"), bytes).unwrap();
    write_png(&dir, "my albedo.png", [200, 200, 200]);
    let gltf = TRIANGLE_GLTF.replace(r#""albedo.png""#, r#""my%20albedo.png""#);
    let path = write_file(&dir, "triangle.gltf", &gltf);

    let mut backend = RecordingBackend::new();
    let model = Model::try_load(&mut backend, &path).unwrap();

    assert_eq!(model.textures_loaded()[0].path, "my albedo.png");
    assert_eq!(backend.uploads_with_data(), 1);
}

#[test]
fn gltf_data_uri_images_are_embedded() {
    use base64::Engine as _;

    let dir = fixture_dir("gltf-data-uri");
    let floats: [f32; 15] = [
        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.25, 0.75, 1.0, 0.75, 0.25, 0.0,
    ];
    let bytes: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();
    std::fs::write(dir.join("triangle.bin"), bytes).unwrap();
    let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes([10, 20, 30]));
    let gltf = TRIANGLE_GLTF.replace(
        r#""albedo.png""#,
        &format!(r#""data:image/png;base64,{encoded}""#),
    );
    let path = write_file(&dir, "triangle.gltf", &gltf);

    let mut backend = RecordingBackend::new();
    let model = Model::try_load(&mut backend, &path).unwrap();

    let texture = &model.textures_loaded()[0];
    assert_eq!(texture.kind, TextureKind::Diffuse);
    assert_eq!(texture.path, "*0");
    assert_eq!(backend.uploads_with_data(), 1);
}

const EMBEDDED_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0] }],
  "nodes": [{ "name": "panel", "mesh": 0 }],
  "meshes": [{
    "name": "panel",
    "primitives": [{
      "attributes": { "POSITION": 0, "NORMAL": 1, "TANGENT": 2 },
      "material": 0
    }]
  }],
  "materials": [{ "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } }],
  "textures": [{ "source": 0 }],
  "images": [{ "bufferView": 3, "mimeType": "image/png" }],
  "buffers": [{ "uri": "panel.bin", "byteLength": BYTE_LENGTH }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 72, "byteLength": 48 },
    { "buffer": 0, "byteOffset": 120, "byteLength": IMAGE_LENGTH }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" },
    { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" }
  ]
}"#;

#[test]
fn gltf_buffer_view_images_and_tangent_handedness() {
    let dir = fixture_dir("gltf-embedded");
    let mut floats: Vec<f32> = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    floats.extend([0.0, 0.0, 1.0].repeat(3));
    floats.extend([1.0, 0.0, 0.0, -1.0].repeat(3));
    let mut bytes: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();
    let png = png_bytes([0, 255, 0]);
    bytes.extend_from_slice(&png);
    std::fs::write(dir.join("panel.bin"), &bytes).unwrap();
    let gltf = EMBEDDED_GLTF
        .replace("BYTE_LENGTH", &bytes.len().to_string())
        .replace("IMAGE_LENGTH", &png.len().to_string());
    let path = write_file(&dir, "panel.gltf", &gltf);

    let mut backend = RecordingBackend::new();
    let model = Model::try_load(&mut backend, &path).unwrap();

    assert_eq!(backend.uploads_with_data(), 1);
    assert_eq!(model.textures_loaded()[0].path, "*0");
    let vertex = &model.meshes()[0].vertices()[0];
    assert_eq!(vertex.tangent, [1.0, 0.0, 0.0]);
    // normal x tangent, flipped by the negative handedness in w.
    assert_eq!(vertex.bitangent, [0.0, -1.0, 0.0]);
}

#[test]
fn dropping_the_model_releases_its_textures() {
    let path = write_quad("release");
    let mut backend = RecordingBackend::new();
    let model = Model::try_load(&mut backend, &path).unwrap();
    assert_eq!(backend.dropped_textures(), 0);
    drop(model);
    assert_eq!(backend.dropped_textures(), 4);
}
