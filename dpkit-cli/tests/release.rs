use std::io::Write;
use std::path::Path;

use dpkit_cli::pipeline::{load_pipeline, PipelineSpec, Release};
use dpkit_core::config::parse_str;
use dpkit_core::{AnyObject, ConfigError, ConfigFormat, ErrorKind, NoiseSource, Value};
use pretty_assertions::assert_eq;

const MEAN_RELEASE: &str = r#"
d-in = 1
d-out = 1.0

[dataset]
type = "Vec<f64>"
values = [5, 5, 5, 5, 5, 5, 5, 5, 5, 5]

[[steps]]
constructor = "make_bounded_mean"
type-args = "<SymmetricDistance, f64>"
params = [0.0, 10.0, 10]

[[steps]]
constructor = "make_base_laplace"
type-args = "<f64>"
params = [0.5]
"#;

fn mean_release() -> PipelineSpec {
    parse_str(MEAN_RELEASE, ConfigFormat::Toml).unwrap()
}

#[test]
fn pipeline_within_budget_is_released() {
    let pipeline = mean_release();
    let Release::Released { output } = pipeline.release(NoiseSource::Seeded(7)).unwrap() else {
        panic!("expected a release");
    };
    assert!(output.downcast_ref::<f64>().unwrap().is_finite());

    let again = pipeline.release(NoiseSource::Seeded(7)).unwrap();
    assert_eq!(again, Release::Released { output });
}

#[test]
fn pipeline_over_budget_is_rejected_without_running() {
    let mut pipeline = mean_release();
    pipeline.d_out = dpkit_cli::pipeline::Literal::Float(0.5);
    // a dataset of the wrong size would fail if the measurement ran
    pipeline.dataset.values.truncate(3);
    assert_eq!(
        pipeline.release(NoiseSource::Seeded(7)).unwrap(),
        Release::Rejected {
            d_out: Value::F64(0.5),
            required: AnyObject::of(1.0),
        }
    );
}

#[test]
fn bundled_pipeline_releases() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/pipeline.toml");
    let pipeline = load_pipeline(&path, ConfigFormat::Auto).unwrap();
    assert_eq!(pipeline.steps.len(), 3);
    assert!(matches!(
        pipeline.release(NoiseSource::Seeded(1)).unwrap(),
        Release::Released { .. }
    ));
}

#[test]
fn yaml_pipelines_load() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(
        file,
        "d-in: 1\n\
         d-out: 2.0\n\
         dataset:\n  type: Vec<i64>\n  values: [1, 2, 3]\n\
         steps:\n\
         \x20 - constructor: make_count\n    type-args: <i64>\n\
         \x20 - constructor: make_base_geometric\n    type-args: <u32>\n    params: [1.0]\n"
    )
    .unwrap();
    let pipeline = load_pipeline(file.path(), ConfigFormat::Auto).unwrap();
    let Release::Released { output } = pipeline.release(NoiseSource::Seeded(3)).unwrap() else {
        panic!("expected a release");
    };
    assert_eq!(output.ty().descriptor(), "u32");
}

#[test]
fn mismatched_steps_fail_to_build() {
    let text = MEAN_RELEASE.replace("make_base_laplace", "make_base_laplace_vec");
    let pipeline: PipelineSpec = parse_str(&text, ConfigFormat::Toml).unwrap();
    let err = pipeline.build(NoiseSource::Seeded(1)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DomainMismatch);
}

#[test]
fn empty_pipeline_is_invalid() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        "d-in = 1\nd-out = 1.0\nsteps = []\n[dataset]\ntype = \"f64\"\nvalues = [1.0]\n"
    )
    .unwrap();
    assert!(matches!(
        load_pipeline(file.path(), ConfigFormat::Auto),
        Err(ConfigError::Validation(_))
    ));
}
