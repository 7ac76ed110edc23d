mod test_support;

use serde_json::{json, Value};
use std::io::{BufRead, Write};
use test_support::{request, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("gradebook-router-smoke");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(Value::is_null).unwrap_or(false));

    let (code, _) = request_err(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(code, "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(workspace.join("gradebook.sqlite3").is_file());

    let methods = [
        "setup.get",
        "setup.update",
        "schools.create",
        "terms.create",
        "classes.create",
        "classTerms.create",
        "subjects.create",
        "classTerms.addSubject",
        "students.create",
        "classTerms.enroll",
        "classTerms.assignTeacher",
        "gradingSystem.get",
        "gradingSystem.set",
        "assessments.fetch",
        "assessments.save",
        "assessments.publish",
        "results.classTerm",
        "results.reportCard",
        "results.dashboard",
        "transitions.evaluate",
        "transitions.execute",
        "transitions.history",
        "editBuffer.open",
        "editBuffer.update",
        "editBuffer.reset",
        "editBuffer.save",
        "editBuffer.clear",
        "editBuffer.get",
    ];
    for (i, method) in methods.iter().enumerate() {
        let id = format!("m{}", i);
        let resp = request(&mut stdin, &mut reader, &id, method, json!({}));
        let code = resp
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str());
        assert_ne!(code, Some("not_implemented"), "{} is not routed", method);
    }

    let (code, err) = request_err(&mut stdin, &mut reader, "4", "grades.explode", json!({}));
    assert_eq!(code, "not_implemented");
    assert_eq!(
        err.get("message").and_then(|v| v.as_str()),
        Some("unknown method: grades.explode")
    );

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let value: Value = serde_json::from_str(line.trim()).expect("parse bad_json response");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("bad_json"));

    // The loop keeps serving after a bad line.
    let _ = request_ok(&mut stdin, &mut reader, "5", "health", json!({}));
}

#[test]
fn missing_params_are_bad_params() {
    let workspace = temp_dir("gradebook-router-params");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let (code, err) = request_err(&mut stdin, &mut reader, "2", "results.classTerm", json!({}));
    assert_eq!(code, "bad_params");
    assert_eq!(err["message"], json!("missing classTermId"));

    let (code, err) = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "results.classTerm",
        json!({ "classTermId": "does-not-exist" }),
    );
    assert_eq!(code, "not_found");
    assert_eq!(err["details"]["entity"], json!("class-term"));

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "schools.create",
        json!({ "name": "   " }),
    );
    assert_eq!(code, "bad_params");
}
