use std::fs;
use std::path::Path;

use glow::gpu::compute::shader_source;

#[test]
fn validate_all_shaders() {
    let shader_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/gpu/shaders");
    let mut errors = Vec::new();

    if !shader_dir.exists() {
        panic!("Shader directory not found: {:?}", shader_dir);
    }

    validate_dir(&shader_dir, &mut errors);

    if !errors.is_empty() {
        panic!("Shader validation failed:\n{}", errors.join("\n"));
    }
}

/// The compute shader is specialised by text substitution; every width the
/// config accepts must still produce a valid module.
#[test]
fn validate_specialised_compute_shader() {
    let mut errors = Vec::new();
    for width in [1, 7, 13, 64, 256] {
        let source = shader_source(width);
        assert!(
            source.contains(&format!("const WORKGROUP_SIZE: u32 = {width}u;")),
            "work-group size {width} was not substituted"
        );
        validate_source(&format!("particle_update.wgsl @ {width}"), &source, &mut errors);
    }

    if !errors.is_empty() {
        panic!("Shader validation failed:\n{}", errors.join("\n"));
    }
}

#[test]
fn shaders_expose_expected_entry_points() {
    let cases = [
        ("particle_update.wgsl", &["update_particles"][..]),
        ("triangles.wgsl", &["vs_main", "fs_main"][..]),
        ("filters.wgsl", &["vs_fullscreen", "fs_laplacian", "fs_area_max", "fs_blur"][..]),
    ];

    let shader_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/gpu/shaders");
    for (file, expected) in cases {
        let source = fs::read_to_string(shader_dir.join(file)).unwrap();
        let module = naga::front::wgsl::parse_str(&source).unwrap();
        let names: Vec<&str> = module.entry_points.iter().map(|ep| ep.name.as_str()).collect();
        for name in expected {
            assert!(names.contains(name), "{file} is missing entry point {name}, has {names:?}");
        }
    }
}

fn validate_dir(dir: &Path, errors: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();

        if path.is_dir() {
            validate_dir(&path, errors);
        } else if path.extension().map_or(false, |ext| ext == "wgsl") {
            let source = fs::read_to_string(&path).unwrap();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            validate_source(&name, &source, errors);
        }
    }
}

fn validate_source(name: &str, source: &str, errors: &mut Vec<String>) {
    let module = match naga::front::wgsl::parse_str(source) {
        Ok(module) => module,
        Err(e) => {
            errors.push(format!("Failed to parse {}:\n{}", name, e.emit_to_string(source)));
            return;
        }
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );

    if let Err(e) = validator.validate(&module) {
        errors.push(format!("Failed to validate {}:\n{:?}", name, e));
    }
}
