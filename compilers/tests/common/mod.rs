//! Shared test helpers: in-process stand-ins for the compiler libraries.

#![allow(dead_code)]

use async_trait::async_trait;
use dialect_compilers::{
    CompileDiagnostic, CompileOutcome, CompilerError, LazyLibrary, OptionValue, PluginOptions,
    StylusCompiler, StylusLibrary, StylusSession, TranspileJob, TypeScriptCompiler,
    TypeScriptLibrary, FILENAME,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

pub static STYLUS_LOADS: AtomicUsize = AtomicUsize::new(0);
pub static FAILED_LOADS: AtomicUsize = AtomicUsize::new(0);

pub static FAKE_STYLUS: LazyLibrary<FakeStylus> = LazyLibrary::new("fake-stylus", FakeStylus::load);
pub static FAILING_STYLUS: LazyLibrary<FakeStylus> = LazyLibrary::new("stylus", FakeStylus::fail);
pub static FAKE_TYPESCRIPT: LazyLibrary<FakeTypeScript> =
    LazyLibrary::new("fake-typescript", FakeTypeScript::load);

pub fn stylus() -> StylusCompiler<FakeStylus> {
    StylusCompiler::with_library(&FAKE_STYLUS)
}

pub fn typescript() -> TypeScriptCompiler<FakeTypeScript> {
    TypeScriptCompiler::with_library(&FAKE_TYPESCRIPT)
}

/// Records every directive call as `method args`.
#[derive(Debug, Default)]
pub struct RecordingSession {
    pub calls: Vec<String>,
}

impl StylusSession for RecordingSession {
    fn set(&mut self, key: &str, value: &OptionValue) {
        self.calls.push(format!("set {} {}", key, value.to_json()));
    }

    fn define(&mut self, name: &str, value: &OptionValue) {
        self.calls.push(format!("define {} {}", name, value.to_json()));
    }

    fn include(&mut self, path: &OptionValue) {
        self.calls.push(format!("include {}", path.to_json()));
    }

    fn import(&mut self, file: &OptionValue) {
        self.calls.push(format!("import {}", file.to_json()));
    }

    fn use_plugin(&mut self, plugin: &OptionValue) {
        self.calls.push(format!("use {}", plugin.to_json()));
    }
}

/// Indentation-based stylesheet compiler good enough for `selector` /
/// `  property value` sources.
pub struct FakeStylus;

impl FakeStylus {
    fn load() -> Result<Self, CompilerError> {
        STYLUS_LOADS.fetch_add(1, Ordering::SeqCst);
        Ok(FakeStylus)
    }

    fn fail() -> Result<Self, CompilerError> {
        FAILED_LOADS.fetch_add(1, Ordering::SeqCst);
        Err(CompilerError::Initialization(
            "Cannot find module 'stylus'".to_string(),
        ))
    }
}

pub struct FakeStylusSession {
    source: String,
    filename: String,
    recorder: RecordingSession,
}

impl StylusSession for FakeStylusSession {
    fn set(&mut self, key: &str, value: &OptionValue) {
        self.recorder.set(key, value);
    }

    fn define(&mut self, name: &str, value: &OptionValue) {
        self.recorder.define(name, value);
    }

    fn include(&mut self, path: &OptionValue) {
        self.recorder.include(path);
    }

    fn import(&mut self, file: &OptionValue) {
        self.recorder.import(file);
    }

    fn use_plugin(&mut self, plugin: &OptionValue) {
        self.recorder.use_plugin(plugin);
    }
}

fn render_css(session: &FakeStylusSession) -> CompileOutcome {
    let mut css = format!("/* {} */\n", session.filename);
    for call in &session.recorder.calls {
        css.push_str(&format!("/* {} */\n", call));
    }

    let mut open = false;
    for (index, line) in session.source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("@error") {
            return Err(CompileDiagnostic {
                message: format!("unexpected {}", trimmed),
                file: Some(session.filename.clone()),
                line: Some(index as u32 + 1),
                column: Some(1),
            });
        }
        if line.starts_with(char::is_whitespace) {
            let (property, value) = trimmed
                .split_once(char::is_whitespace)
                .unwrap_or((trimmed, ""));
            css.push_str(&format!("  {}: {};\n", property, value.trim()));
        } else {
            if open {
                css.push_str("}\n");
            }
            css.push_str(&format!("{} {{\n", trimmed));
            open = true;
        }
    }
    if open {
        css.push_str("}\n");
    }
    Ok(css)
}

#[async_trait]
impl StylusLibrary for FakeStylus {
    type Session = FakeStylusSession;

    fn session(&self, source: &str, options: &PluginOptions) -> FakeStylusSession {
        FakeStylusSession {
            source: source.to_string(),
            filename: options
                .get(FILENAME)
                .and_then(OptionValue::as_str)
                .unwrap_or("stdin")
                .to_string(),
            recorder: RecordingSession::default(),
        }
    }

    fn render_sync(&self, session: FakeStylusSession) -> Result<CompileOutcome, CompilerError> {
        Ok(render_css(&session))
    }

    async fn render(&self, session: FakeStylusSession) -> Result<CompileOutcome, CompilerError> {
        tokio::task::yield_now().await;
        Ok(render_css(&session))
    }

    fn version() -> Result<String, CompilerError> {
        Ok("0.63.0".to_string())
    }
}

/// Strips `: number` annotations and rejects string-to-number assignments
/// when checking. Mutates its options the way real compilers do.
pub struct FakeTypeScript;

impl FakeTypeScript {
    fn load() -> Result<Self, CompilerError> {
        Ok(FakeTypeScript)
    }
}

fn emit(mut job: TranspileJob) -> CompileOutcome {
    job.compiler_options
        .insert("noEmitOnError".to_string(), Value::Bool(true));

    if job.semantic_checks && job.source.contains(": number = '") {
        return Err(CompileDiagnostic {
            message: "Type 'string' is not assignable to type 'number'.".to_string(),
            file: Some(job.file_name.clone()),
            line: Some(1),
            column: Some(5),
        });
    }

    let jsx = job
        .compiler_options
        .get("jsx")
        .and_then(Value::as_str)
        .unwrap_or("none");
    Ok(format!(
        "\"use strict\";\n// {} checked={} jsx={}\n{}\n",
        job.file_name,
        job.semantic_checks,
        jsx,
        job.source.replace(": number", "")
    ))
}

#[async_trait]
impl TypeScriptLibrary for FakeTypeScript {
    fn transpile_sync(&self, job: TranspileJob) -> Result<CompileOutcome, CompilerError> {
        Ok(emit(job))
    }

    async fn transpile(&self, job: TranspileJob) -> Result<CompileOutcome, CompilerError> {
        tokio::task::yield_now().await;
        Ok(emit(job))
    }

    fn version() -> Result<String, CompilerError> {
        Ok("5.4.5".to_string())
    }
}
