#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_WORKSPACE")
        .env("GRADEBOOKD_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(Value::Null)
}

/// Asserts failure and returns the error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> (String, Value) {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    let error = value.get("error").cloned().unwrap_or(Value::Null);
    let code = error
        .get("code")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    (code, error)
}

/// A sidecar with an open workspace and a small roster: one school, two terms, a class-term
/// per term, three subjects offered in the first, and students enrolled in the first.
pub struct Fixture {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    pub school_id: String,
    pub term_id: String,
    pub class_term_id: String,
    pub next_class_term_id: String,
    pub subject_ids: Vec<String>,
    pub student_ids: Vec<String>,
    seq: u64,
}

impl Fixture {
    pub fn new(prefix: &str, students: &[(&str, &str)]) -> Self {
        let workspace = temp_dir(prefix);
        let (child, stdin, reader) = spawn_sidecar();
        let mut fx = Fixture {
            child,
            stdin,
            reader,
            school_id: String::new(),
            term_id: String::new(),
            class_term_id: String::new(),
            next_class_term_id: String::new(),
            subject_ids: Vec::new(),
            student_ids: Vec::new(),
            seq: 0,
        };
        fx.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));

        let school = fx.ok("schools.create", json!({ "name": "Hillcrest" }));
        fx.school_id = str_field(&school, "schoolId");
        let term1 = fx.ok("terms.create", json!({ "schoolId": fx.school_id, "name": "First Term" }));
        fx.term_id = str_field(&term1, "termId");
        let term2 = fx.ok("terms.create", json!({ "schoolId": fx.school_id, "name": "Second Term" }));
        let term2_id = str_field(&term2, "termId");

        let class = fx.ok("classes.create", json!({ "schoolId": fx.school_id, "name": "JSS 1A" }));
        let class_id = str_field(&class, "classId");
        let next_class = fx.ok("classes.create", json!({ "schoolId": fx.school_id, "name": "JSS 2A" }));
        let next_class_id = str_field(&next_class, "classId");

        let ct = fx.ok("classTerms.create", json!({ "classId": class_id, "termId": fx.term_id }));
        fx.class_term_id = str_field(&ct, "classTermId");
        let next_ct = fx.ok("classTerms.create", json!({ "classId": next_class_id, "termId": term2_id }));
        fx.next_class_term_id = str_field(&next_ct, "classTermId");

        for (name, code) in [("Mathematics", "MTH"), ("English", "ENG"), ("Basic Science", "BSC")] {
            let s = fx.ok(
                "subjects.create",
                json!({ "schoolId": fx.school_id, "name": name, "code": code }),
            );
            let subject_id = str_field(&s, "subjectId");
            fx.ok(
                "classTerms.addSubject",
                json!({
                    "classTermId": fx.class_term_id,
                    "subjectId": subject_id,
                    "teacherName": format!("{} Teacher", name),
                }),
            );
            fx.subject_ids.push(subject_id);
        }

        for (last, first) in students {
            let st = fx.ok(
                "students.create",
                json!({ "schoolId": fx.school_id, "lastName": last, "firstName": first }),
            );
            fx.student_ids.push(str_field(&st, "studentId"));
        }
        if !fx.student_ids.is_empty() {
            let ids = fx.student_ids.clone();
            fx.ok("classTerms.enroll", json!({ "classTermId": fx.class_term_id, "studentIds": ids }));
        }
        fx
    }

    fn next_id(&mut self) -> String {
        self.seq += 1;
        self.seq.to_string()
    }

    pub fn raw(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id();
        request(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn err(&mut self, method: &str, params: Value) -> (String, Value) {
        let id = self.next_id();
        request_err(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    /// Levels 70/60/50/45/40/0 with pass mark 40.
    pub fn set_standard_grading(&mut self) -> Value {
        let school_id = self.school_id.clone();
        self.ok(
            "gradingSystem.set",
            json!({
                "schoolId": school_id,
                "name": "Standard",
                "passMark": 40,
                "levels": [
                    { "grade": "A", "minScore": 70, "maxScore": 100, "remark": "Excellent" },
                    { "grade": "B", "minScore": 60, "maxScore": 70, "remark": "Very Good" },
                    { "grade": "C", "minScore": 50, "maxScore": 60, "remark": "Good" },
                    { "grade": "D", "minScore": 45, "maxScore": 50, "remark": "Fair" },
                    { "grade": "E", "minScore": 40, "maxScore": 45, "remark": "Pass" },
                    { "grade": "F", "minScore": 0, "maxScore": 40, "remark": "Fail" }
                ]
            }),
        )
    }

    /// Saves one full row per `(student index, [ca1, ca2, ca3, exam])` for a subject.
    pub fn save_scores(&mut self, subject: usize, rows: &[(usize, [f64; 4])]) -> Value {
        let payload: Vec<Value> = rows
            .iter()
            .map(|(s, c)| {
                json!({
                    "studentId": self.student_ids[*s],
                    "ca1": c[0], "ca2": c[1], "ca3": c[2], "exam": c[3],
                })
            })
            .collect();
        let class_term_id = self.class_term_id.clone();
        let subject_id = self.subject_ids[subject].clone();
        self.ok(
            "assessments.save",
            json!({ "classTermId": class_term_id, "subjectId": subject_id, "rows": payload }),
        )
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|x| x.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}
