//! Lua script engine using mlua.
//!
//! Provides a sandboxed Lua runtime for filter and interceptor scripts with:
//! - Limited stdlib (no io, os.execute, etc.)
//! - Memory limits
//! - Execution deadlines enforced through an instruction hook
//! - The routable exposed as userdata with tag, lock and field methods

use async_trait::async_trait;
use mlua::{
    AnyUserData, FromLua, Function, HookTriggers, IntoLua, Lua, LuaSerdeExt, Table, UserData,
    UserDataFields, UserDataMethods, Value, VmState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{
    InterceptorRunner, Script, ScriptEngine, ScriptError, ScriptLimits, ScriptOutcome, StatusValue,
};
use crate::router::{Param, Routable, RoutableError, Tag};

/// Instructions between two deadline checks.
const DEADLINE_CHECK_INTERVAL: u32 = 1000;


struct LuaState {
    lua: Lua,
    /// Compiled chunks keyed by source
    compiled: HashMap<String, Function>,
}

/// Lua implementation of [`ScriptEngine`] and [`InterceptorRunner`].
///
/// A single interpreter is shared by every script; calls are serialized.
pub struct LuaScriptEngine {
    state: Arc<Mutex<LuaState>>,
    limits: ScriptLimits,
}

impl std::fmt::Debug for LuaScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaScriptEngine")
            .field("limits", &self.limits)
            .field("compiled", &lock(&self.state).compiled.len())
            .finish()
    }
}

impl LuaScriptEngine {
    /// Create an engine with a fresh sandbox.
    pub fn new(limits: ScriptLimits) -> Result<Self, ScriptError> {
        let lua = create_sandbox(&limits)?;

        debug!(
            memory_mb = limits.memory_mb,
            timeout = ?limits.timeout,
            "lua script engine created"
        );

        Ok(Self {
            state: Arc::new(Mutex::new(LuaState {
                lua,
                compiled: HashMap::new(),
            })),
            limits,
        })
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    /// Number of distinct compiled sources.
    pub fn compiled_count(&self) -> usize {
        lock(&self.state).compiled.len()
    }
}

impl ScriptEngine for LuaScriptEngine {
    fn compile(&self, source: &str) -> Result<(), ScriptError> {
        let mut state = lock(&self.state);
        function_for(&mut state, source).map(|_| ())
    }

    fn eval_filter(&self, source: &str, routable: &Routable) -> Result<bool, ScriptError> {
        let mut state = lock(&self.state);
        let func = function_for(&mut state, source)?;
        let lua = &state.lua;
        let env = script_env(lua)?;

        // The filter works on a copy, changes must not leak into routing
        let userdata = lua.create_userdata(routable.clone()).map_err(runtime)?;
        env.raw_set("routable", userdata).map_err(runtime)?;
        env.raw_set("result", false).map_err(runtime)?;
        func.set_environment(env.clone()).map_err(runtime)?;

        let started = Instant::now();
        let outcome = call_with_deadline(lua, &func, &self.limits);
        log_if_slow(&self.limits, started, source);
        outcome?;

        Ok(matches!(env.raw_get::<Value>("result"), Ok(Value::Boolean(true))))
    }

    fn run_interceptor(
        &self,
        script: &Script,
        routable: Routable,
    ) -> Result<ScriptOutcome, ScriptError> {
        let mut state = lock(&self.state);
        run_interceptor_in(&mut state, &self.limits, script, routable)
    }
}

#[async_trait]
impl InterceptorRunner for LuaScriptEngine {
    async fn run(&self, script: &Script, routable: Routable) -> Result<ScriptOutcome, ScriptError> {
        let state = Arc::clone(&self.state);
        let limits = self.limits.clone();
        let script = script.clone();

        tokio::task::spawn_blocking(move || {
            let mut state = lock(&state);
            run_interceptor_in(&mut state, &limits, &script, routable)
        })
        .await
        .map_err(|e| ScriptError::Unavailable(format!("interceptor task failed: {}", e)))?
    }
}

fn lock(state: &Mutex<LuaState>) -> MutexGuard<'_, LuaState> {
    // A panic mid-script leaves the interpreter usable, each run gets a fresh environment
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_interceptor_in(
    state: &mut LuaState,
    limits: &ScriptLimits,
    script: &Script,
    routable: Routable,
) -> Result<ScriptOutcome, ScriptError> {
    let func = function_for(state, script.source())?;
    let lua = &state.lua;
    let env = script_env(lua)?;

    let source_addr = routable.field("source_addr").map(|p| p.as_text().into_owned());
    let destination_addr = routable
        .field("destination_addr")
        .map(|p| p.as_text().into_owned());
    info!(
        kind = %script.kind(),
        from = source_addr.as_deref().unwrap_or("-"),
        to = destination_addr.as_deref().unwrap_or("-"),
        "running interceptor script"
    );

    let userdata = lua.create_userdata(routable).map_err(runtime)?;
    env.raw_set("routable", userdata).map_err(runtime)?;
    env.raw_set("extra", lua.create_table().map_err(runtime)?)
        .map_err(runtime)?;
    func.set_environment(env.clone()).map_err(runtime)?;

    let started = Instant::now();
    let outcome = call_with_deadline(lua, &func, limits)
        .and_then(|()| read_interceptor_outcome(lua, &env));
    log_if_slow(limits, started, script.source());

    match &outcome {
        Ok(ScriptOutcome::Rejected {
            smpp_status,
            http_status,
            ..
        }) => info!(smpp_status, http_status, "interceptor script rejected message"),
        Ok(ScriptOutcome::Routable(_)) => {}
        Err(e) => warn!(error = %e, "interceptor script failed"),
    }

    outcome
}

fn read_interceptor_outcome(lua: &Lua, env: &Table) -> Result<ScriptOutcome, ScriptError> {
    let smpp_status = status_value(env.raw_get::<Value>("smpp_status").map_err(runtime)?);
    let http_status = status_value(env.raw_get::<Value>("http_status").map_err(runtime)?);

    let extra = match env.raw_get::<Value>("extra").map_err(runtime)? {
        Value::Nil => serde_json::Value::Null,
        value => lua
            .from_value::<serde_json::Value>(value)
            .map_err(|e| ScriptError::InvalidResult {
                name: "extra".to_string(),
                reason: e.to_string(),
            })?,
    };

    if let Some(rejected) = ScriptOutcome::from_statuses(smpp_status, http_status, extra) {
        return Ok(rejected);
    }

    let routable = env
        .raw_get::<AnyUserData>("routable")
        .and_then(|ud| ud.take::<Routable>())
        .map_err(|e| ScriptError::InvalidResult {
            name: "routable".to_string(),
            reason: e.to_string(),
        })?;

    Ok(ScriptOutcome::Routable(routable))
}

fn status_value(value: Value) -> StatusValue {
    match value {
        Value::Nil => StatusValue::Unset,
        Value::Integer(v) => StatusValue::Integer(v),
        _ => StatusValue::Invalid,
    }
}

/// Get a compiled chunk, compiling on first use.
fn function_for(state: &mut LuaState, source: &str) -> Result<Function, ScriptError> {
    if let Some(func) = state.compiled.get(source) {
        return Ok(func.clone());
    }

    let func = state
        .lua
        .load(source)
        .set_name("script")
        .into_function()
        .map_err(|e| match e {
            mlua::Error::MemoryError(_) => ScriptError::MemoryLimitExceeded,
            other => ScriptError::Compile(other.to_string()),
        })?;

    debug!(script = %first_line(source), "compiled lua script");
    state.compiled.insert(source.to_string(), func.clone());
    Ok(func)
}

/// Call `func`, aborting it once the configured timeout elapses.
fn call_with_deadline(
    lua: &Lua,
    func: &Function,
    limits: &ScriptLimits,
) -> Result<(), ScriptError> {
    let timeout = limits.timeout;
    let deadline = Instant::now() + timeout;
    let expired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&expired);

    lua.set_hook(
        HookTriggers::new().every_nth_instruction(DEADLINE_CHECK_INTERVAL),
        move |_lua, _debug| {
            if Instant::now() >= deadline {
                flag.store(true, Ordering::Relaxed);
                return Err(mlua::Error::runtime("script deadline exceeded"));
            }
            Ok(VmState::Continue)
        },
    );

    let result = func.call::<()>(());
    lua.remove_hook();

    result.map_err(|e| {
        if expired.load(Ordering::Relaxed) {
            ScriptError::Timeout(timeout)
        } else {
            match e {
                mlua::Error::MemoryError(_) => ScriptError::MemoryLimitExceeded,
                other => ScriptError::Runtime(other.to_string()),
            }
        }
    })
}

/// Fresh environment for one script run.
///
/// Reads fall through to the sandbox globals; writes, including through
/// `_G`, stay in the returned table.
fn script_env(lua: &Lua) -> Result<Table, ScriptError> {
    let env = lua.create_table().map_err(runtime)?;
    let meta = lua.create_table().map_err(runtime)?;
    meta.raw_set("__index", lua.globals()).map_err(runtime)?;
    env.set_metatable(Some(meta));
    env.raw_set("_G", env.clone()).map_err(runtime)?;
    Ok(env)
}

fn log_if_slow(limits: &ScriptLimits, started: Instant, source: &str) {
    let elapsed = started.elapsed();
    match limits.slow_threshold {
        Some(threshold) if elapsed >= threshold => {
            warn!(elapsed = ?elapsed, script = %first_line(source), "slow script execution");
        }
        _ => debug!(elapsed = ?elapsed, "script executed"),
    }
}

fn first_line(source: &str) -> &str {
    source.trim_start().lines().next().unwrap_or_default()
}

fn runtime(e: mlua::Error) -> ScriptError {
    ScriptError::Runtime(e.to_string())
}

/// Create a sandboxed Lua environment.
fn create_sandbox(limits: &ScriptLimits) -> Result<Lua, ScriptError> {
    let lua = Lua::new();

    let memory_limit = limits.memory_mb.checked_mul(1024 * 1024).ok_or_else(|| {
        ScriptError::Unavailable(format!(
            "memory limit of {} MB is too large",
            limits.memory_mb
        ))
    })?;
    lua.set_memory_limit(memory_limit)
        .map_err(|e| ScriptError::Unavailable(format!("failed to set memory limit: {}", e)))?;

    {
        let globals = lua.globals();

        // Keep os.time, os.date and os.clock
        if let Ok(os_table) = globals.get::<Table>("os") {
            for name in ["execute", "exit", "remove", "rename", "setlocale", "getenv", "tmpname"] {
                let _ = os_table.set(name, Value::Nil);
            }
        }

        for name in ["io", "loadfile", "dofile", "debug"] {
            let _ = globals.set(name, Value::Nil);
        }

        if let Ok(package_table) = globals.get::<Table>("package") {
            let _ = package_table.set("loadlib", Value::Nil);
        }
    }

    add_gateway_api(&lua)?;

    Ok(lua)
}

/// Add the `smsrouter` API table to the Lua environment.
fn add_gateway_api(lua: &Lua) -> Result<(), ScriptError> {
    let setup = |e: mlua::Error| ScriptError::Unavailable(format!("failed to set up api: {}", e));
    let api = lua.create_table().map_err(setup)?;

    // smsrouter.log(level, message)
    let log_fn = lua
        .create_function(|_, (level, message): (String, String)| {
            match level.as_str() {
                "trace" => tracing::trace!(script = "lua", "{}", message),
                "debug" => tracing::debug!(script = "lua", "{}", message),
                "warn" => tracing::warn!(script = "lua", "{}", message),
                "error" => tracing::error!(script = "lua", "{}", message),
                _ => tracing::info!(script = "lua", "{}", message),
            }
            Ok(())
        })
        .map_err(setup)?;

    api.set("log", log_fn).map_err(setup)?;
    api.set("version", env!("CARGO_PKG_VERSION")).map_err(setup)?;
    lua.globals().set("smsrouter", api).map_err(setup)?;

    Ok(())
}

// Lua conversions

impl IntoLua for Tag {
    fn into_lua(self, lua: &Lua) -> mlua::Result<Value> {
        match self {
            Tag::Int(v) => Ok(Value::Integer(v)),
            Tag::Str(s) => s.into_lua(lua),
        }
    }
}

impl FromLua for Tag {
    fn from_lua(value: Value, _lua: &Lua) -> mlua::Result<Self> {
        match value {
            Value::Integer(v) => Ok(Tag::Int(v)),
            Value::String(s) => Ok(Tag::Str(s.to_string_lossy().to_string())),
            other => Err(mlua::Error::external(RoutableError::InvalidTag(
                other.type_name().to_string(),
            ))),
        }
    }
}

impl IntoLua for Param {
    fn into_lua(self, lua: &Lua) -> mlua::Result<Value> {
        match self {
            Param::Int(v) => Ok(Value::Integer(v)),
            Param::Text(s) => s.into_lua(lua),
            Param::Bytes(b) => lua.create_string(&b).map(Value::String),
        }
    }
}

impl FromLua for Param {
    fn from_lua(value: Value, _lua: &Lua) -> mlua::Result<Self> {
        match value {
            Value::Integer(v) => Ok(Param::Int(v)),
            Value::String(s) => match String::from_utf8(s.as_bytes().to_vec()) {
                Ok(text) => Ok(Param::Text(text)),
                Err(e) => Ok(Param::Bytes(e.into_bytes())),
            },
            other => Err(mlua::Error::runtime(format!(
                "PDU parameters must be integers or strings, got {}",
                other.type_name()
            ))),
        }
    }
}

impl UserData for Routable {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("user_id", |_, this| {
            Ok(this.user().map(|u| u.id().to_string()))
        });
        fields.add_field_method_get("group_id", |_, this| {
            Ok(this.user().map(|u| u.group_id().to_string()))
        });
        fields.add_field_method_get("connector_id", |_, this| {
            Ok(this.connector().map(|c| c.id().to_string()))
        });
        fields.add_field_method_get("command", |_, this| Ok(this.pdu().command().to_string()));
        fields.add_field_method_get("timestamp", |_, this| {
            Ok(this.timestamp().format("%Y-%m-%d %H:%M:%S").to_string())
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut("add_tag", |_, this, tag: Tag| {
            this.add_tag(tag);
            Ok(())
        });
        methods.add_method("has_tag", |_, this, tag: Tag| Ok(this.has_tag(&tag)));
        methods.add_method_mut("remove_tag", |_, this, tag: Tag| {
            this.remove_tag(&tag).map_err(mlua::Error::external)
        });
        methods.add_method("get_tags", |_, this, ()| Ok(this.tags().to_vec()));
        methods.add_method_mut("flush_tags", |_, this, ()| {
            this.flush_tags();
            Ok(())
        });

        methods.add_method_mut("lock_field", |_, this, name: String| {
            this.lock_field(&name).map_err(mlua::Error::external)
        });
        methods.add_method("is_field_locked", |_, this, name: String| {
            this.is_field_locked(&name).map_err(mlua::Error::external)
        });
        methods.add_method_mut("flush_locks", |_, this, ()| {
            this.flush_locks();
            Ok(())
        });

        methods.add_method("get_field", |_, this, name: String| Ok(this.field(&name).cloned()));
        methods.add_method_mut("set_field", |_, this, (name, value): (String, Param)| {
            this.set_field(&name, value).map_err(mlua::Error::external)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{Connector, Pdu, User};
    use serde_json::json;
    use std::time::Duration;

    fn engine() -> LuaScriptEngine {
        LuaScriptEngine::new(ScriptLimits::default()).unwrap()
    }

    fn mt_routable() -> Routable {
        Routable::submit_sm(
            Pdu::submit_sm("20203060", "20203060", "hello world"),
            User::new("1", "100"),
        )
    }

    // ============================================================================
    // Sandbox Tests
    // ============================================================================

    #[test]
    fn test_sandbox_creation() {
        let lua = create_sandbox(&ScriptLimits::default()).unwrap();
        let globals = lua.globals();

        assert!(globals.get::<Value>("io").unwrap() == Value::Nil);
        assert!(globals.get::<Value>("dofile").unwrap() == Value::Nil);

        let os_table: Table = globals.get("os").unwrap();
        assert!(os_table.get::<Value>("execute").unwrap() == Value::Nil);
        assert!(os_table.contains_key("time").unwrap());

        let api: Table = globals.get("smsrouter").unwrap();
        assert!(api.contains_key("log").unwrap());
    }

    #[test]
    fn test_oversized_memory_limit_rejected() {
        let err = LuaScriptEngine::new(ScriptLimits {
            memory_mb: usize::MAX,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ScriptError::Unavailable(ref m) if m.contains("too large")));
    }

    #[test]
    fn test_compile_errors() {
        let engine = engine();
        assert!(matches!(
            engine.compile("result = = true"),
            Err(ScriptError::Compile(_))
        ));
    }

    #[test]
    fn test_compile_cache_per_source() {
        let engine = engine();
        engine.compile("result = true").unwrap();
        engine.compile("result = true").unwrap();
        engine.compile("result = false").unwrap();
        assert_eq!(engine.compiled_count(), 2);
    }

    #[test]
    fn test_timeout() {
        let engine = LuaScriptEngine::new(ScriptLimits {
            timeout: Duration::from_millis(50),
            ..Default::default()
        })
        .unwrap();

        let err = engine
            .eval_filter("while true do end", &mt_routable())
            .unwrap_err();
        assert!(matches!(err, ScriptError::Timeout(_)));

        // Engine stays usable afterwards
        assert!(engine.eval_filter("result = true", &mt_routable()).unwrap());
    }

    #[test]
    fn test_memory_limit() {
        let engine = LuaScriptEngine::new(ScriptLimits {
            memory_mb: 1,
            timeout: Duration::from_secs(10),
            ..Default::default()
        })
        .unwrap();

        let script = r#"
            local t = {}
            for i = 1, 10000000 do
                t[i] = string.rep("x", 64) .. i
            end
        "#;
        let err = engine.eval_filter(script, &mt_routable()).unwrap_err();
        assert!(matches!(err, ScriptError::MemoryLimitExceeded));
    }

    // ============================================================================
    // Filter Script Tests
    // ============================================================================

    #[test]
    fn test_filter_result() {
        let engine = engine();
        let routable = mt_routable();

        assert!(engine.eval_filter("result = true", &routable).unwrap());
        assert!(!engine.eval_filter("result = false", &routable).unwrap());
        assert!(!engine.eval_filter("-- nothing", &routable).unwrap());
    }

    #[test]
    fn test_filter_non_boolean_result_is_false() {
        let engine = engine();
        assert!(!engine.eval_filter("result = 1", &mt_routable()).unwrap());
        assert!(!engine.eval_filter("result = 'yes'", &mt_routable()).unwrap());
    }

    #[test]
    fn test_filter_reads_routable() {
        let engine = engine();
        let script = r#"
            result = routable.user_id == "1"
                and routable.group_id == "100"
                and routable:get_field("destination_addr") == "20203060"
        "#;
        assert!(engine.eval_filter(script, &mt_routable()).unwrap());
    }

    #[test]
    fn test_filter_sees_tags() {
        let engine = engine();
        let mut routable = mt_routable();
        routable.add_tag(23);

        assert!(engine.eval_filter("result = routable:has_tag(23)", &routable).unwrap());
        assert!(!engine.eval_filter("result = routable:has_tag('23')", &routable).unwrap());
    }

    #[test]
    fn test_filter_runtime_error_surfaces() {
        let engine = engine();
        let err = engine
            .eval_filter("result = nothing.here", &mt_routable())
            .unwrap_err();
        assert!(matches!(err, ScriptError::Runtime(_)));
    }

    #[test]
    fn test_filter_changes_do_not_leak() {
        let engine = engine();
        let routable = mt_routable();
        engine
            .eval_filter("routable:add_tag(1)\nresult = true", &routable)
            .unwrap();
        assert!(routable.tags().is_empty());
        assert!(!engine.eval_filter("result = routable:has_tag(1)", &routable).unwrap());
    }

    #[test]
    fn test_filter_globals_do_not_persist() {
        let engine = engine();
        let routable = mt_routable();
        let script = "if seen then result = true end\nseen = true";

        assert!(!engine.eval_filter(script, &routable).unwrap());
        assert!(!engine.eval_filter(script, &routable).unwrap());
    }

    #[test]
    fn test_scripts_can_not_remove_libraries_for_others() {
        let engine = engine();
        let check = "result = string.sub('abc', 1, 1) == 'a'";

        engine
            .run_interceptor(&Script::mt("string = nil"), mt_routable())
            .unwrap();
        assert!(engine.eval_filter(check, &mt_routable()).unwrap());

        engine
            .eval_filter("_G.string = nil\nresult = true", &mt_routable())
            .unwrap();
        assert!(engine.eval_filter(check, &mt_routable()).unwrap());
    }

    #[test]
    fn test_interceptor_statuses_do_not_leak() {
        let engine = engine();
        let outcome = engine
            .run_interceptor(&Script::mt("smpp_status = 8"), mt_routable())
            .unwrap();
        assert!(matches!(outcome, ScriptOutcome::Rejected { .. }));

        // The next run starts with both statuses unset
        let routable = mt_routable();
        let outcome = engine
            .run_interceptor(&Script::mt("local unused = smpp_status"), routable.clone())
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Routable(routable));
    }

    // ============================================================================
    // Interceptor Script Tests
    // ============================================================================

    #[test]
    fn test_interceptor_passthrough() {
        let engine = engine();
        let routable = mt_routable();
        let outcome = engine
            .run_interceptor(&Script::mt("local a = 1"), routable.clone())
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Routable(routable));
    }

    #[test]
    fn test_interceptor_modifies_routable() {
        let engine = engine();
        let script = Script::mt(
            r#"
            routable:set_field("source_addr", "SENDER")
            routable:lock_field("source_addr")
            routable:add_tag(10)
            routable:add_tag("vip")
        "#,
        );

        let outcome = engine.run_interceptor(&script, mt_routable()).unwrap();
        let ScriptOutcome::Routable(routable) = outcome else {
            panic!("expected routable outcome");
        };
        assert_eq!(routable.field("source_addr"), Some(&Param::from("SENDER")));
        assert!(routable.is_field_locked("source_addr").unwrap());
        assert_eq!(routable.tags(), &[Tag::Int(10), Tag::from("vip")]);
    }

    #[test]
    fn test_interceptor_http_status_only() {
        let engine = engine();
        let outcome = engine
            .run_interceptor(&Script::mt("http_status = 404"), mt_routable())
            .unwrap();
        assert!(matches!(
            outcome,
            ScriptOutcome::Rejected {
                smpp_status: 255,
                http_status: 404,
                ..
            }
        ));
    }

    #[test]
    fn test_interceptor_smpp_status_only() {
        let engine = engine();
        let outcome = engine
            .run_interceptor(&Script::mt("smpp_status = 64"), mt_routable())
            .unwrap();
        assert!(matches!(
            outcome,
            ScriptOutcome::Rejected {
                smpp_status: 64,
                http_status: 520,
                ..
            }
        ));
    }

    #[test]
    fn test_interceptor_extra() {
        let engine = engine();
        let script = Script::mt("smpp_status = 67\nhttp_status = 300\nextra.reason = 'blocked'");
        let outcome = engine.run_interceptor(&script, mt_routable()).unwrap();
        assert_eq!(
            outcome,
            ScriptOutcome::Rejected {
                smpp_status: 67,
                http_status: 300,
                extra: json!({"reason": "blocked"}),
            }
        );
    }

    #[test]
    fn test_interceptor_invalid_tag_fails() {
        let engine = engine();
        let err = engine
            .run_interceptor(&Script::mt("routable:add_tag({})"), mt_routable())
            .unwrap_err();
        assert!(matches!(err, ScriptError::Runtime(ref m) if m.contains("invalid tag")));
    }

    #[test]
    fn test_interceptor_remove_missing_tag_fails() {
        let engine = engine();
        let err = engine
            .run_interceptor(&Script::mt("routable:remove_tag(30)"), mt_routable())
            .unwrap_err();
        assert!(matches!(err, ScriptError::Runtime(ref m) if m.contains("tag not found")));
    }

    #[test]
    fn test_interceptor_replaced_routable_fails() {
        let engine = engine();
        let err = engine
            .run_interceptor(&Script::mt("routable = 1"), mt_routable())
            .unwrap_err();
        assert!(matches!(err, ScriptError::InvalidResult { ref name, .. } if name == "routable"));
    }

    #[test]
    fn test_mo_routable_fields() {
        let engine = engine();
        let routable = Routable::deliver_sm(
            Pdu::deliver_sm("1234", "5678", "hi"),
            Connector::smppc("abc"),
        );
        let script = "result = routable.connector_id == 'abc' and routable.user_id == nil";
        assert!(engine.eval_filter(script, &routable).unwrap());
    }

    #[tokio::test]
    async fn test_async_runner() {
        let engine = engine();
        let outcome = engine
            .run(&Script::mo("smpp_status = 8"), mt_routable())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ScriptOutcome::Rejected { smpp_status: 8, .. }
        ));
    }
}
