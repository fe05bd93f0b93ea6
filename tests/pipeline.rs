use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
    time::{Duration, SystemTime},
};

use base64::Engine;
use cruel_assets::{
    codec, loader,
    meta::{self, MetadataStore},
    AssetUid, GraphicsDevice, HeadlessDevice, ImportOutcome, LibraryStore, PipelineConfig,
    ResourceKind, ResourceManager,
};

struct Fixture {
    dir: tempfile::TempDir,
    device: Rc<HeadlessDevice>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            device: Rc::new(HeadlessDevice::new()),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::with_assets_root(self.root())
    }

    fn manager(&self) -> ResourceManager {
        self.manager_with(self.config())
    }

    fn manager_with(&self, config: PipelineConfig) -> ResourceManager {
        ResourceManager::new(config, Rc::clone(&self.device) as Rc<dyn GraphicsDevice>)
    }

    fn library(&self) -> LibraryStore {
        LibraryStore::new(self.config().library_dir())
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn write_png(path: &Path) {
    image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
        .save(path)
        .unwrap();
}

const BARE_TRIANGLE_OBJ: &str = "\
o tri
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
";

const FULL_QUAD_OBJ: &str = "\
o quad
v -1.0 -1.0 0.5
v 1.0 -1.0 0.5
v 1.0 1.0 0.5
v -1.0 1.0 0.5
vn 0.0 0.0 1.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

/// A glTF with one mesh of `primitives` primitives sharing one triangle, buffer inlined.
fn write_gltf(path: &Path, primitives: usize) {
    let mut bytes = Vec::new();
    for position in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for component in position {
            bytes.extend_from_slice(&component.to_le_bytes());
        }
    }
    for index in [0u16, 1, 2] {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );

    let primitive = r#"{ "attributes": { "POSITION": 0 }, "indices": 1 }"#;
    let primitives = vec![primitive; primitives].join(", ");

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{ "primitives": [{primitives}] }}],
  "buffers": [{{ "byteLength": {len}, "uri": "{uri}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
        primitives = primitives,
        len = bytes.len(),
        uri = uri
    );

    fs::write(path, json).unwrap();
}

#[test]
fn identity_is_stable_across_calls_and_managers() {
    let fx = Fixture::new();
    let source = fx.path("crate.png");
    write_png(&source);

    let first = fx.manager().get_or_create_identity(&source);
    let second = fx.manager().get_or_create_identity(&source);
    assert_eq!(first, second);
    assert!(first.is_valid());

    // Losing the sidecar mints a new identity.
    fs::remove_file(meta::sidecar_path(&source)).unwrap();
    assert_ne!(fx.manager().get_or_create_identity(&source), first);
}

#[test]
fn corrupt_sidecar_is_replaced() {
    let fx = Fixture::new();
    let source = fx.path("crate.png");
    write_png(&source);
    fs::write(meta::sidecar_path(&source), "UID: 0\nTime: 3\n").unwrap();

    let uid = fx.manager().get_or_create_identity(&source);
    assert!(uid.is_valid());
    let record = MetadataStore::new().read(&source).unwrap().unwrap();
    assert_eq!(record.uid, uid);
}

#[test]
fn equal_timestamps_do_not_reimport() {
    let fx = Fixture::new();
    let source = fx.path("crate.png");
    let artifact = fx.path("artifact.tex");
    fs::write(&source, b"src").unwrap();
    fs::write(&artifact, b"bin").unwrap();

    let t100 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
    set_mtime(&source, t100);
    set_mtime(&artifact, t100);

    assert!(!fx.library().needs_reimport(&source, &artifact));
}

#[test]
fn bare_mesh_gets_zeroed_normals_and_uvs() {
    let fx = Fixture::new();
    let source = fx.path("tri.obj");
    fs::write(&source, BARE_TRIANGLE_OBJ).unwrap();
    let uid = AssetUid(7);

    loader::import(&source, uid, &fx.library()).unwrap();

    let headers = codec::read_mesh_index(&fx.library().artifact_path(uid, ResourceKind::Mesh)).unwrap();
    assert_eq!(headers.len(), 1);

    let mesh = codec::read_mesh(&fx.library().submesh_path(uid, 0)).unwrap();
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.index_count(), 3);
    assert!(mesh.normals.iter().all(|n| *n == [0.0; 3]));
    assert!(mesh.uvs.iter().all(|uv| *uv == [0.0; 2]));
}

#[test]
fn imported_mesh_round_trips_exactly() {
    let fx = Fixture::new();
    let source = fx.path("quad.obj");
    fs::write(&source, FULL_QUAD_OBJ).unwrap();
    let uid = AssetUid(8);

    let decoded = loader::load_mesh(&source).unwrap();
    loader::import(&source, uid, &fx.library()).unwrap();
    let stored = codec::read_mesh(&fx.library().submesh_path(uid, 0)).unwrap();

    assert_eq!(stored, decoded[0]);
    assert_eq!(stored.index_count(), 6);
    assert_eq!(stored.uvs[0], [0.0, 1.0]);
}

#[test]
fn first_request_imports_then_loads() {
    let fx = Fixture::new();
    let source = fx.path("wall.png");
    write_png(&source);
    let mut manager = fx.manager();

    let uid = manager.get_or_create_identity(&source);
    let artifact = fx.library().artifact_path(uid, ResourceKind::Texture);
    assert!(!artifact.exists());

    let handle = manager.get_or_load(uid).unwrap();

    assert!(artifact.is_file());
    let resource = handle.borrow();
    assert!(resource.is_loaded());
    assert_eq!(resource.kind(), ResourceKind::Texture);
    assert_eq!(resource.reference_count(), 1);
    assert_eq!(resource.as_texture().map(|t| (t.width, t.height)), Some((4, 2)));
    assert_eq!(fx.device.stats().textures_uploaded, 1);

    let record = MetadataStore::new().read(&source).unwrap().unwrap();
    assert_eq!(record.uid, uid);
    assert_eq!(record.time, meta::source_time(&source));
}

#[test]
fn stale_artifact_is_rewritten_on_first_request() {
    let fx = Fixture::new();
    let source = fx.path("wall.png");
    write_png(&source);
    let uid = {
        let mut manager = fx.manager();
        assert_eq!(manager.import_file(&source), ImportOutcome::Imported);
        manager.get_or_create_identity(&source)
    };

    let artifact = fx.library().artifact_path(uid, ResourceKind::Texture);
    let t100 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
    let t200 = SystemTime::UNIX_EPOCH + Duration::from_secs(200);
    set_mtime(&artifact, t100);
    set_mtime(&source, t200);

    let mut manager = fx.manager();
    assert_eq!(manager.get_or_create_identity(&source), uid);
    let handle = manager.get_or_load(uid).unwrap();

    assert!(fs::metadata(&artifact).unwrap().modified().unwrap() > t200);
    assert!(handle.borrow().is_loaded());
    assert_eq!(fx.device.stats().textures_uploaded, 1);
    let record = MetadataStore::new().read(&source).unwrap().unwrap();
    assert_eq!(record.time, 200);
}

#[test]
fn truncated_artifact_is_reimported_on_first_request() {
    let fx = Fixture::new();
    let source = fx.path("wall.png");
    write_png(&source);
    let uid = {
        let mut manager = fx.manager();
        assert_eq!(manager.import_file(&source), ImportOutcome::Imported);
        manager.get_or_create_identity(&source)
    };

    // Newer than the source, so the timestamp rule alone keeps it.
    let artifact = fx.library().artifact_path(uid, ResourceKind::Texture);
    let full_len = fs::metadata(&artifact).unwrap().len();
    fs::File::options()
        .write(true)
        .open(&artifact)
        .unwrap()
        .set_len(5)
        .unwrap();

    let mut manager = fx.manager();
    assert_eq!(manager.import_file(&source), ImportOutcome::UpToDate);
    let handle = manager.get_or_load(uid).unwrap();

    assert!(handle.borrow().is_loaded());
    assert_eq!(handle.borrow().as_texture().map(|t| (t.width, t.height)), Some((4, 2)));
    assert_eq!(fs::metadata(&artifact).unwrap().len(), full_len);
    assert_eq!(fx.device.stats().textures_uploaded, 1);
}

#[test]
fn two_consumers_share_one_resource() {
    let fx = Fixture::new();
    let source = fx.path("house.obj");
    fs::write(&source, BARE_TRIANGLE_OBJ).unwrap();
    fs::write(meta::sidecar_path(&source), "UID: 42\nTime: 0\n").unwrap();
    let mut manager = fx.manager();

    assert_eq!(manager.get_or_create_identity(&source), AssetUid(42));
    let a = manager.get_or_load(AssetUid(42)).unwrap();
    let b = manager.get_or_load(AssetUid(42)).unwrap();

    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(manager.len(), 1);
    assert_eq!(a.borrow().reference_count(), 2);
    assert_eq!(fx.device.stats().meshes_uploaded, 1);

    let by_path = manager.get_or_load_path(&source).unwrap();
    assert!(Rc::ptr_eq(&a, &by_path));
}

#[test]
fn freeing_an_unloaded_texture_is_silent() {
    let fx = Fixture::new();
    let mut manager = fx.manager();

    let handle = manager
        .create_resource(ResourceKind::Texture, AssetUid(3), None)
        .unwrap();
    handle.borrow_mut().free_memory(manager.device());

    assert!(!handle.borrow().is_loaded());
    assert_eq!(fx.device.stats().total_calls(), 0);
}

#[test]
fn lifecycle_calls_are_idempotent() {
    let fx = Fixture::new();
    let source = fx.path("wall.png");
    write_png(&source);
    let mut manager = fx.manager();

    let handle = manager.get_or_load_path(&source).unwrap();
    let mut resource = handle.borrow_mut();

    assert!(resource.load_in_memory(manager.device()));
    assert!(resource.load_in_memory(manager.device()));
    assert_eq!(fx.device.stats().textures_uploaded, 1);

    resource.free_memory(manager.device());
    resource.free_memory(manager.device());
    assert!(!resource.is_loaded());
    assert_eq!(fx.device.stats().textures_deleted, 1);

    // Bind brings it back on demand.
    assert!(resource.bind(manager.device(), 0));
    assert!(resource.is_loaded());
    assert_eq!(fx.device.stats().texture_binds, 1);
}

#[test]
fn every_gltf_primitive_becomes_a_submesh() {
    let fx = Fixture::new();
    let source = fx.path("pair.gltf");
    write_gltf(&source, 2);
    let mut manager = fx.manager();

    let handle = manager.get_or_load_path(&source).unwrap();
    let mut resource = handle.borrow_mut();
    assert!(resource.is_loaded());
    assert_eq!(resource.as_mesh().map(|m| m.submeshes.len()), Some(2));

    assert!(resource.bind(manager.device(), 0));
    assert_eq!(fx.device.stats().draws, 2);

    let uid = resource.uid();
    let stored = codec::read_mesh(&fx.library().submesh_path(uid, 1)).unwrap();
    assert_eq!(stored.positions[1], [1.0, 0.0, 0.0]);
    assert_eq!(stored.indices, vec![0, 1, 2]);
}

#[test]
fn scan_imports_once_and_reimports_changed_sources() {
    let fx = Fixture::new();
    write_png(&fx.path("a.png"));
    fs::create_dir(fx.path("props")).unwrap();
    fs::write(fx.path("props/tri.obj"), BARE_TRIANGLE_OBJ).unwrap();
    fs::write(fx.path("readme.txt"), b"notes").unwrap();
    let mut manager = fx.manager();

    let report = manager.import_all_assets(fx.root());
    assert_eq!(report.total, 3);
    assert_eq!(report.imported, 2);
    assert_eq!(report.unsupported, 1);
    assert!(!report.cancelled);
    // Nothing is cached unless asked for.
    assert!(manager.is_empty());

    let report = manager.import_all_assets(fx.root());
    assert_eq!(report.up_to_date, 2);
    assert_eq!(report.imported, 0);

    set_mtime(&fx.path("a.png"), SystemTime::now() + Duration::from_secs(3600));
    let report = manager.import_all_assets(fx.root());
    assert_eq!(report.imported, 1);
    assert_eq!(report.up_to_date, 1);
}

#[test]
fn failed_import_is_retried_on_next_scan() {
    let fx = Fixture::new();
    let source = fx.path("broken.png");
    fs::write(&source, b"definitely not a png").unwrap();
    let mut manager = fx.manager();

    let report = manager.import_all_assets(fx.root());
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].0, source);
    assert!(fx.library().artifacts().unwrap().is_empty());

    write_png(&source);
    let report = manager.import_all_assets(fx.root());
    assert_eq!(report.imported, 1);
    assert_eq!(fx.library().artifacts().unwrap().len(), 1);
}

#[test]
fn cancelled_batch_stops_before_the_next_asset() {
    let fx = Fixture::new();
    for name in ["a.png", "b.png", "c.png"] {
        write_png(&fx.path(name));
    }
    let mut manager = fx.manager();

    let batch = manager.import_batch(fx.root()).unwrap();
    let token = batch.cancel_token();
    let mut seen = Vec::new();

    let report = batch.run(&mut manager, |progress| {
        seen.push((progress.index, progress.total, progress.outcome.clone()));
        token.cancel();
    });

    assert_eq!(seen, vec![(0, 3, ImportOutcome::Imported)]);
    assert!(report.cancelled);
    assert_eq!(report.processed(), 1);
    assert_eq!(fx.library().artifacts().unwrap().len(), 1);
}

#[test]
fn stepping_a_batch_interleaves_with_other_work() {
    let fx = Fixture::new();
    write_png(&fx.path("a.png"));
    write_png(&fx.path("b.png"));
    let mut manager = fx.manager();

    let mut batch = manager.import_batch(fx.root()).unwrap();
    let first = batch.step(&mut manager).unwrap();
    assert_eq!(first.path, fx.path("a.png"));
    assert_eq!(batch.remaining(), 1);

    let second = batch.step(&mut manager).unwrap();
    assert_eq!(second.index, 1);
    assert!(batch.step(&mut manager).is_none());
    assert!(batch.is_finished());
    assert_eq!(batch.finish().imported, 2);
}

#[test]
fn preload_on_scan_fills_the_cache_without_references() {
    let fx = Fixture::new();
    write_png(&fx.path("a.png"));
    fs::write(fx.path("tri.obj"), BARE_TRIANGLE_OBJ).unwrap();
    let mut manager = fx.manager_with(PipelineConfig {
        preload_on_scan: true,
        ..fx.config()
    });

    manager.import_all_assets(fx.root());

    let entries = manager.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.loaded && e.references == 0));
    assert_eq!(manager.evict_unused(), 2);
    assert_eq!(fx.device.stats().live_meshes(), 0);
    assert_eq!(fx.device.stats().live_textures(), 0);
}

#[test]
fn reimport_unloads_the_cached_copy() {
    let fx = Fixture::new();
    let source = fx.path("wall.png");
    write_png(&source);
    let mut manager = fx.manager();

    let handle = manager.get_or_load_path(&source).unwrap();
    assert!(handle.borrow().is_loaded());

    set_mtime(&source, SystemTime::now() + Duration::from_secs(3600));
    assert_eq!(manager.import_file(&source), ImportOutcome::Imported);
    assert!(!handle.borrow().is_loaded());

    assert!(handle.borrow_mut().bind(manager.device(), 0));
    assert_eq!(fx.device.stats().textures_uploaded, 2);
    assert_eq!(fx.device.stats().live_textures(), 1);
}

#[test]
fn missing_source_leaves_a_placeholder() {
    let fx = Fixture::new();
    let source = fx.path("ghost.png");
    let mut manager = fx.manager();

    manager.register_source(AssetUid(77), &source);
    let handle = manager.get_or_load(AssetUid(77)).unwrap();

    assert!(!handle.borrow().is_loaded());
    assert!(!handle.borrow_mut().bind(manager.device(), 0));
    assert_eq!(fx.device.stats().total_calls(), 0);
}

#[test]
fn clean_purges_artifacts_of_deleted_sources() {
    let fx = Fixture::new();
    write_png(&fx.path("keep.png"));
    write_png(&fx.path("gone.png"));
    let mut manager = fx.manager();
    manager.import_all_assets(fx.root());
    let kept = manager.get_or_create_identity(&fx.path("keep.png"));

    fs::remove_file(fx.path("gone.png")).unwrap();
    fs::remove_file(meta::sidecar_path(&fx.path("gone.png"))).unwrap();

    assert_eq!(manager.purge_orphans(fx.root()).unwrap(), 1);
    assert_eq!(
        fx.library().artifacts().unwrap(),
        vec![(kept, ResourceKind::Texture)]
    );
}
