use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use pipebind::{bind_program, parse_program, run_program, Diagnostic, DiagnosticSeverity};
use walkdir::WalkDir;

fn golden_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/golden")
}

fn bless_enabled() -> bool {
    std::env::var("PIPEBIND_BLESS").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n")
}

fn write_blessed(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write blessed golden");
}

fn severity_str(sev: DiagnosticSeverity) -> &'static str {
    match sev {
        DiagnosticSeverity::Error => "error",
        DiagnosticSeverity::Warning => "warning",
    }
}

fn diagnostics_snapshot(diags: &[Diagnostic]) -> serde_json::Value {
    let items = diags
        .iter()
        .map(|diag| {
            serde_json::json!({
                "code": diag.code,
                "severity": severity_str(diag.severity),
                "message": diag.message,
            })
        })
        .collect();
    serde_json::Value::Array(items)
}

fn list_cases(root: &Path) -> Vec<PathBuf> {
    let mut cases = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == OsStr::new("input.json"))
    {
        cases.push(entry.path().parent().expect("case dir").to_path_buf());
    }
    cases.sort();
    cases
}

fn run_case(case_dir: &Path) {
    let input =
        normalize_newlines(&fs::read_to_string(case_dir.join("input.json")).expect("read input"));
    let program = parse_program(&input).expect("parse program");
    let bound = bind_program(&program);

    // 1) Diagnostics snapshot (only if the golden exists or the program has errors).
    let diagnostics_path = case_dir.join("diagnostics.json");
    if bound.has_errors() || diagnostics_path.exists() {
        let actual = diagnostics_snapshot(&bound.diagnostics);
        if bless_enabled() {
            let mut text = serde_json::to_string_pretty(&actual).expect("pretty json");
            text.push('\n');
            write_blessed(&diagnostics_path, &text);
        } else {
            let expected: serde_json::Value = serde_json::from_str(
                &fs::read_to_string(&diagnostics_path).expect("read diagnostics golden"),
            )
            .expect("diagnostics golden is json");
            assert_eq!(
                actual,
                expected,
                "diagnostics snapshot mismatch for {}",
                case_dir.display()
            );
        }

        // Lowering must not change what gets reported.
        let lowered = bind_program(&program.lowered());
        assert_eq!(
            diagnostics_snapshot(&lowered.diagnostics),
            actual,
            "lowered diagnostics differ for {}",
            case_dir.display()
        );
        return;
    }

    // 2) Evaluated value snapshot, for the program as written and lowered.
    let value_path = case_dir.join("value.txt");
    let value = run_program(&program)
        .unwrap_or_else(|err| panic!("run failed for {}: {err}", case_dir.display()));
    let actual = format!("{value}\n");
    if bless_enabled() {
        write_blessed(&value_path, &actual);
    } else {
        let expected =
            normalize_newlines(&fs::read_to_string(&value_path).expect("read value golden"));
        assert_eq!(
            actual.trim_end(),
            expected.trim_end(),
            "value snapshot mismatch for {}",
            case_dir.display()
        );
    }
    let lowered = run_program(&program.lowered())
        .unwrap_or_else(|err| panic!("lowered run failed for {}: {err}", case_dir.display()));
    assert_eq!(lowered, value, "lowered value differs for {}", case_dir.display());
}

#[test]
fn goldens_are_up_to_date() {
    let root = golden_root();
    let cases = list_cases(&root);
    assert!(
        !cases.is_empty(),
        "no golden cases found under {}",
        root.display()
    );

    for case_dir in cases {
        run_case(&case_dir);
    }
}
