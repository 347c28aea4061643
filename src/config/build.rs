//! Router construction from configuration.

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::fs;
use std::sync::Arc;
use tracing::info;

use super::types::{
    Config, FilterSpec, InterceptorEntryConfig, InterceptorSpec, RouteEntryConfig, RouteSpec,
    ScriptSource,
};
use crate::router::{Connector, Direction, Filter, Interceptor, Route, Router, User};
use crate::script::{InterceptorRunner, LuaScriptEngine, Script, ScriptEngine};

impl Config {
    /// Look up a declared connector.
    pub fn connector(&self, id: &str) -> Option<Connector> {
        self.connectors
            .iter()
            .find(|c| c.id == id)
            .map(|c| Connector::new(c.id.clone(), c.kind))
    }

    /// Look up a declared user.
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id() == id)
    }

    /// Build a router with every configured table populated.
    ///
    /// Filter and interceptor scripts share one Lua engine.
    pub fn build_router(&self) -> Result<Router> {
        let engine = Arc::new(
            LuaScriptEngine::new(self.scripts.clone()).context("failed to create script engine")?,
        );
        let scripts: Arc<dyn ScriptEngine> = engine.clone();
        let runner: Arc<dyn InterceptorRunner> = engine;

        let router = Router::new(runner);

        for (direction, entries) in [
            (Direction::Mt, &self.mt_routes),
            (Direction::Mo, &self.mo_routes),
        ] {
            for entry in entries {
                let route = self.build_route(entry, &scripts).with_context(|| {
                    format!("invalid {} route at order {}", direction, entry.order)
                })?;
                router
                    .add_route(direction, route, entry.order)
                    .with_context(|| {
                        format!("failed to add {} route at order {}", direction, entry.order)
                    })?;
            }
        }

        for (direction, entries) in [
            (Direction::Mt, &self.mt_interceptors),
            (Direction::Mo, &self.mo_interceptors),
        ] {
            for entry in entries {
                let interceptor = self
                    .build_interceptor(direction, entry, &scripts)
                    .with_context(|| {
                        format!("invalid {} interceptor at order {}", direction, entry.order)
                    })?;
                router
                    .add_interceptor(direction, interceptor, entry.order)
                    .with_context(|| {
                        format!("failed to add {} interceptor at order {}", direction, entry.order)
                    })?;
            }
        }

        info!(
            mt_routes = self.mt_routes.len(),
            mo_routes = self.mo_routes.len(),
            mt_interceptors = self.mt_interceptors.len(),
            mo_interceptors = self.mo_interceptors.len(),
            "router built"
        );

        Ok(router)
    }

    fn resolve(&self, id: &str) -> Result<Connector> {
        self.connector(id).with_context(|| format!("unknown connector: {}", id))
    }

    fn resolve_all(&self, ids: &[String]) -> Result<Vec<Connector>> {
        ids.iter().map(|id| self.resolve(id)).collect()
    }

    fn build_route(
        &self,
        entry: &RouteEntryConfig,
        scripts: &Arc<dyn ScriptEngine>,
    ) -> Result<Route> {
        let filters = build_filters(entry.route.filters(), scripts)?;

        let route = match &entry.route {
            RouteSpec::Default { connector, rate } => {
                Route::default_route(self.resolve(connector)?, *rate)?
            }
            RouteSpec::StaticMo { connector, .. } => {
                Route::static_mo(filters, self.resolve(connector)?)?
            }
            RouteSpec::StaticMt { connector, rate, .. } => {
                Route::static_mt(filters, self.resolve(connector)?, *rate)?
            }
            RouteSpec::RandomRoundrobinMo { connectors, .. } => {
                Route::random_roundrobin_mo(filters, self.resolve_all(connectors)?)?
            }
            RouteSpec::RandomRoundrobinMt { connectors, rate, .. } => {
                Route::random_roundrobin_mt(filters, self.resolve_all(connectors)?, *rate)?
            }
            RouteSpec::FailoverMo { connectors, .. } => {
                Route::failover_mo(filters, self.resolve_all(connectors)?)?
            }
            RouteSpec::FailoverMt { connectors, rate, .. } => {
                Route::failover_mt(filters, self.resolve_all(connectors)?, *rate)?
            }
        };

        Ok(route)
    }

    fn build_interceptor(
        &self,
        direction: Direction,
        entry: &InterceptorEntryConfig,
        scripts: &Arc<dyn ScriptEngine>,
    ) -> Result<Interceptor> {
        let filters = build_filters(entry.interceptor.filters(), scripts)?;

        let interceptor = match &entry.interceptor {
            InterceptorSpec::Default { script } => {
                let source = load_script(script)?;
                let script = match direction {
                    Direction::Mo => Script::mo(source.as_ref()),
                    Direction::Mt => Script::mt(source.as_ref()),
                };
                Interceptor::default_interceptor(script)
            }
            InterceptorSpec::StaticMo { script, .. } => {
                Interceptor::static_mo(filters, Script::mo(load_script(script)?.as_ref()))?
            }
            InterceptorSpec::StaticMt { script, .. } => {
                Interceptor::static_mt(filters, Script::mt(load_script(script)?.as_ref()))?
            }
        };

        // Syntax errors show up at load time rather than on the first message
        scripts.compile(interceptor.script().source())?;

        Ok(interceptor)
    }
}

fn build_filters(specs: &[FilterSpec], scripts: &Arc<dyn ScriptEngine>) -> Result<Vec<Filter>> {
    specs.iter().map(|spec| build_filter(spec, scripts)).collect()
}

fn build_filter(spec: &FilterSpec, scripts: &Arc<dyn ScriptEngine>) -> Result<Filter> {
    let filter = match spec {
        FilterSpec::Transparent => Filter::Transparent,
        FilterSpec::Connector { id } => Filter::connector(id.clone()),
        FilterSpec::User { id } => Filter::user(id.clone()),
        FilterSpec::Group { id } => Filter::group(id.clone()),
        FilterSpec::SourceAddr { pattern } => Filter::source_addr(pattern)?,
        FilterSpec::DestinationAddr { pattern } => Filter::destination_addr(pattern)?,
        FilterSpec::ShortMessage { pattern } => Filter::short_message(pattern)?,
        FilterSpec::DateInterval { bounds } => Filter::date_interval(bounds)?,
        FilterSpec::TimeInterval { bounds } => Filter::time_interval(bounds)?,
        FilterSpec::EvalScript { script } => {
            Filter::eval_script(load_script(script)?.as_ref(), Arc::clone(scripts))?
        }
        FilterSpec::Tag { tag } => Filter::Tag(tag.clone()),
    };
    Ok(filter)
}

fn load_script(source: &ScriptSource) -> Result<Cow<'_, str>> {
    match source {
        ScriptSource::Inline(code) => Ok(Cow::Borrowed(code)),
        ScriptSource::File { file } => fs::read_to_string(file)
            .map(Cow::Owned)
            .with_context(|| format!("failed to read script file: {}", file.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Pdu;
    use crate::router::Routable;
    use std::io::Write;

    const YAML: &str = r#"
connectors:
  - id: smsc1
    type: smppc
  - id: smsc2
    type: smppc
  - id: app
    type: http
groups: [g1]
users:
  - id: u1
    group_id: g1
mt_routes:
  - order: 0
    type: default
    connector: smsc1
  - order: 20
    type: failover_mt
    connectors: [smsc1, smsc2]
    rate: 0.5
    filters:
      - type: eval_script
        script: "result = routable:get_field('destination_addr') == '999'"
mo_routes:
  - order: 0
    type: default
    connector: app
mt_interceptors:
  - order: 0
    type: default
    script: "routable:add_tag(1)"
"#;

    #[test]
    fn test_build_router() {
        let config = Config::from_yaml(YAML).unwrap();
        let router = config.build_router().unwrap();

        let mt = router.routes(Direction::Mt);
        assert_eq!(mt.iter().map(|(o, _)| *o).collect::<Vec<_>>(), vec![20, 0]);
        assert_eq!(mt[0].1.type_name(), "FailoverMTRoute");
        assert_eq!(router.routes(Direction::Mo).len(), 1);
        assert_eq!(router.interceptors(Direction::Mt).len(), 1);

        let user = config.user("u1").cloned().unwrap();
        let routable = Routable::submit_sm(Pdu::submit_sm("1", "999", "hi"), user.clone());
        let decision = router.route_for(Direction::Mt, &routable).unwrap().unwrap();
        assert_eq!(decision.order(), 20);

        let routable = Routable::submit_sm(Pdu::submit_sm("1", "111", "hi"), user);
        let decision = router.route_for(Direction::Mt, &routable).unwrap().unwrap();
        assert_eq!(decision.order(), 0);
    }

    #[test]
    fn test_default_route_at_nonzero_order_fails() {
        let yaml = r#"
connectors:
  - id: smsc1
    type: smppc
mt_routes:
  - order: 3
    type: default
    connector: smsc1
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let err = config.build_router().unwrap_err();
        assert!(format!("{:#}", err).contains("order 3"));
    }

    #[test]
    fn test_wrong_connector_kind_fails() {
        let yaml = r#"
connectors:
  - id: app
    type: http
mt_routes:
  - order: 0
    type: default
    connector: app
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.build_router().is_err());
    }

    #[test]
    fn test_mo_script_in_mt_table_fails() {
        let yaml = r#"
mt_interceptors:
  - order: 1
    type: static_mo
    script: "smpp_status = 8"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.build_router().is_err());
    }

    #[test]
    fn test_script_syntax_error_fails() {
        let yaml = r#"
mo_interceptors:
  - order: 0
    type: default
    script: "smpp_status = = 8"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.build_router().is_err());
    }

    #[test]
    fn test_script_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http_status = 403").unwrap();

        let yaml = format!(
            r#"
mo_interceptors:
  - order: 0
    type: default
    script:
      file: {}
"#,
            file.path().display()
        );
        let config = Config::from_yaml(&yaml).unwrap();
        let router = config.build_router().unwrap();
        let interceptors = router.interceptors(Direction::Mo);
        assert_eq!(interceptors[0].1.script().source().trim(), "http_status = 403");
    }
}
