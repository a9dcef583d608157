use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(p) = stack.pop() {
        let entries = match fs::read_dir(&p) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for ent in entries.flatten() {
            let path = ent.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[test]
fn model_output_is_only_decoded_through_guardrails() {
    // Structured model output must fail closed; ad hoc parsing elsewhere would bypass that.
    let src_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
    let files = collect_rs_files(&src_root);
    assert!(!files.is_empty());

    for f in files {
        if f.ends_with("guardrails.rs") || f.parent().is_some_and(|p| p.ends_with("index")) {
            continue;
        }
        let text = fs::read_to_string(&f).unwrap_or_default();
        assert!(
            !text.contains("serde_json::from_str"),
            "direct JSON decoding found in {}",
            f.display()
        );
    }
}

#[test]
fn only_local_model_endpoints_are_referenced() {
    let src_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
    for f in collect_rs_files(&src_root) {
        let text = fs::read_to_string(&f).unwrap_or_default();
        // Unit tests legitimately feed remote URLs to the localhost check.
        let code = text.split("#[cfg(test)]").next().unwrap_or_default();
        assert!(!code.contains("https://"), "remote endpoint found in {}", f.display());
    }
}
