//! Flattens per-module tool catalogs into one name-unique function set
//!
//! Function names that occur in more than one place are either rejected or
//! renamed with a sanitized, de-duplicated module prefix
//! (`FileSystem_read`, `FileSystem2_read`, ...). Modules are visited in the
//! catalog's insertion order so renames are reproducible.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::error::LlmError;
use crate::types::{FunctionDefinition, ToolCatalog, ToolDescriptor, ToolError};

/// Prefix used when a module name sanitizes to nothing
pub const DEFAULT_PREFIX: &str = "tool";

/// A descriptor paired with the name advertised to the provider
#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    /// Name unique within one request
    pub name: String,
    /// Source descriptor, unchanged
    pub descriptor: ToolDescriptor,
}

impl ResolvedFunction {
    /// Pair a descriptor with its advertised name
    pub fn new(name: String, descriptor: &ToolDescriptor) -> Self {
        Self {
            name,
            descriptor: descriptor.clone(),
        }
    }

    /// Whether the advertised name differs from the declared one
    pub fn is_renamed(&self) -> bool {
        self.name != self.descriptor.name
    }

    /// Definition sent to the provider
    pub fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: self.name.clone(),
            description: self.descriptor.description.clone(),
            parameters: self.descriptor.json_schema(),
        }
    }

    /// Run the handler with model-supplied arguments
    ///
    /// Accepts a JSON object, `null`, or a string holding a JSON object.
    pub async fn invoke(&self, arguments: &Value) -> Result<Value, ToolError> {
        let mut arguments = argument_map(arguments)?;
        self.descriptor.apply_defaults(&mut arguments);
        self.descriptor.handler.invoke(arguments).await
    }
}

fn argument_map(arguments: &Value) -> Result<Map<String, Value>, ToolError> {
    match arguments {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        Value::String(raw) if raw.trim().is_empty() => Ok(Map::new()),
        Value::String(raw) => match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ToolError::InvalidArguments("arguments must be a JSON object".to_owned())),
            Err(e) => Err(ToolError::InvalidArguments(format!("malformed arguments: {e}"))),
        },
        _ => Err(ToolError::InvalidArguments("arguments must be a JSON object".to_owned())),
    }
}

/// Reduce a module name to a usable function-name prefix
///
/// Keeps ASCII letters, digits and underscores, then trims digits from both
/// ends. Falls back to [`DEFAULT_PREFIX`] when nothing is left.
pub fn sanitize_prefix(module: Option<&str>) -> String {
    let kept: String = module
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let trimmed = kept.trim_matches(|c: char| c.is_ascii_digit());

    if trimmed.is_empty() {
        DEFAULT_PREFIX.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Prefixes handed out during one resolution, with usage counts
#[derive(Debug, Clone, Default)]
pub struct PrefixRegistry {
    used: HashMap<String, u32>,
}

impl PrefixRegistry {
    /// Seed a registry with already-claimed prefixes
    pub fn with_used<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for prefix in prefixes {
            *registry.used.entry(prefix.into()).or_default() += 1;
        }
        registry
    }

    /// Claim `base` if unused, otherwise `base2`, `base3`, ...
    pub fn claim(&mut self, base: &str) -> String {
        let chosen = if self.used.contains_key(base) {
            (2u32..)
                .map(|n| format!("{base}{n}"))
                .find(|candidate| !self.used.contains_key(candidate))
                .unwrap_or_else(|| base.to_owned())
        } else {
            base.to_owned()
        };

        *self.used.entry(chosen.clone()).or_default() += 1;
        chosen
    }

    /// Times a prefix has been claimed
    pub fn uses(&self, prefix: &str) -> u32 {
        self.used.get(prefix).copied().unwrap_or_default()
    }
}

/// Resolve a catalog into provider-ready functions
///
/// Returns `Ok(None)` when no tools are supplied.
pub fn resolve(tools: Option<&ToolCatalog>, auto_resolve: bool) -> Result<Option<Vec<ResolvedFunction>>, LlmError> {
    resolve_with(tools, auto_resolve, ResolvedFunction::new)
}

/// Resolve a catalog, building each output through `build`
///
/// `build` receives the final name and the source descriptor. It is not
/// called at all when there is nothing to resolve or when a conflict is
/// rejected.
pub fn resolve_with<T, F>(tools: Option<&ToolCatalog>, auto_resolve: bool, mut build: F) -> Result<Option<Vec<T>>, LlmError>
where
    F: FnMut(String, &ToolDescriptor) -> T,
{
    let Some(tools) = tools.filter(|catalog| catalog.values().any(|descriptors| !descriptors.is_empty())) else {
        return Ok(None);
    };

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for descriptor in tools.values().flatten() {
        *occurrences.entry(descriptor.name.as_str()).or_default() += 1;
    }

    let collides = |name: &str| occurrences.get(name).is_some_and(|count| *count > 1);

    if !auto_resolve
        && let Some((module, descriptor)) = tools
            .iter()
            .flat_map(|(module, descriptors)| descriptors.iter().map(move |d| (module, d)))
            .find(|(_, d)| collides(&d.name))
    {
        return Err(LlmError::ToolNameConflict {
            function: descriptor.name.clone(),
            module: module.clone(),
        });
    }

    let mut taken: HashSet<String> = tools
        .values()
        .flatten()
        .filter(|d| !collides(&d.name))
        .map(|d| d.name.clone())
        .collect();

    let mut prefixes = PrefixRegistry::default();
    let mut resolved = Vec::with_capacity(tools.values().map(Vec::len).sum());

    for (module, descriptors) in tools {
        let base = sanitize_prefix(Some(module.as_str()));

        for descriptor in descriptors {
            if !collides(&descriptor.name) {
                resolved.push(build(descriptor.name.clone(), descriptor));
                continue;
            }

            let name = loop {
                let prefix = prefixes.claim(&base);
                let candidate = format!("{prefix}_{}", descriptor.name);
                if taken.insert(candidate.clone()) {
                    break candidate;
                }
            };

            tracing::debug!(module = %module, function = %descriptor.name, renamed = %name, "renamed conflicting tool");
            resolved.push(build(name, descriptor));
        }
    }

    Ok(Some(resolved))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::types::{ToolHandler, ToolParameter};

    struct Echo;

    #[async_trait::async_trait]
    impl ToolHandler for Echo {
        async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
            Ok(Value::Object(arguments))
        }
    }

    fn tool(module: &str, name: &str) -> ToolDescriptor {
        ToolDescriptor::new(module, name, format!("{module}.{name}"), Arc::new(Echo))
    }

    fn catalog(entries: &[(&str, &[&str])]) -> ToolCatalog {
        entries
            .iter()
            .map(|(module, names)| {
                (
                    (*module).to_owned(),
                    names.iter().map(|name| tool(module, name)).collect(),
                )
            })
            .collect()
    }

    fn names(resolved: &[ResolvedFunction]) -> Vec<&str> {
        resolved.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn sanitize_examples() {
        assert_eq!(sanitize_prefix(Some("ValidName_test")), "ValidName_test");
        assert_eq!(sanitize_prefix(Some("File-System!@#123")), "FileSystem");
        assert_eq!(sanitize_prefix(Some("")), "tool");
        assert_eq!(sanitize_prefix(None), "tool");
        assert_eq!(sanitize_prefix(Some("!@#123")), "tool");
        assert_eq!(sanitize_prefix(Some("v2_api")), "v2_api");
    }

    #[test]
    fn sanitize_keeps_inner_digits() {
        assert_eq!(sanitize_prefix(Some("3dModel4x4")), "dModel4x");
        assert_eq!(sanitize_prefix(Some("Web 2 Search")), "Web2Search");
    }

    #[test]
    fn registry_suffixes_start_at_two() {
        let mut registry = PrefixRegistry::with_used(["FileSystem"]);
        assert_eq!(registry.claim("FileSystem"), "FileSystem2");

        let mut registry = PrefixRegistry::with_used(["FileSystem", "FileSystem2"]);
        assert_eq!(registry.claim("FileSystem"), "FileSystem3");
        assert_eq!(registry.uses("FileSystem3"), 1);
    }

    #[test]
    fn unused_prefix_is_kept() {
        let mut registry = PrefixRegistry::default();
        assert_eq!(registry.claim("Git"), "Git");
        assert_eq!(registry.uses("Git"), 1);
    }

    #[test]
    fn unique_names_pass_through() {
        let tools = catalog(&[("FileSystem", &["read_file", "write_file"]), ("Web", &["search"])]);
        let resolved = resolve(Some(&tools), false).unwrap().unwrap();

        assert_eq!(names(&resolved), ["read_file", "write_file", "search"]);
        assert!(resolved.iter().all(|f| !f.is_renamed()));
    }

    #[test]
    fn conflicts_are_prefixed_with_module() {
        let tools = catalog(&[
            ("File-System", &["read", "list"]),
            ("Web", &["read"]),
            ("web!", &["read"]),
        ]);

        let resolved = resolve(Some(&tools), true).unwrap().unwrap();
        assert_eq!(names(&resolved), ["FileSystem_read", "list", "Web_read", "web_read"]);
        assert_eq!(resolved[0].descriptor.name, "read");
        assert_eq!(resolved[0].descriptor.description, "File-System.read");
    }

    #[test]
    fn modules_that_sanitize_alike_are_disambiguated() {
        let tools = catalog(&[("Web", &["fetch"]), ("Web!", &["fetch"]), ("Web?", &["fetch"])]);

        let resolved = resolve(Some(&tools), true).unwrap().unwrap();
        assert_eq!(names(&resolved), ["Web_fetch", "Web2_fetch", "Web3_fetch"]);
    }

    #[test]
    fn every_colliding_descriptor_claims_its_own_prefix() {
        let tools = catalog(&[("Disk", &["read", "write"]), ("Net", &["read", "write"])]);

        let resolved = resolve(Some(&tools), true).unwrap().unwrap();
        assert_eq!(names(&resolved), ["Disk_read", "Disk2_write", "Net_read", "Net2_write"]);
    }

    #[test]
    fn renamed_functions_avoid_existing_names() {
        let tools = catalog(&[("A", &["run", "B_run"]), ("B", &["run"])]);

        let resolved = resolve(Some(&tools), true).unwrap().unwrap();
        let mut seen = HashSet::new();
        assert!(resolved.iter().all(|f| seen.insert(f.name.clone())));
        assert_eq!(names(&resolved), ["A_run", "B_run", "B2_run"]);
    }

    #[test]
    fn conflict_without_auto_resolve_names_first_module() {
        let tools = catalog(&[("Alpha", &["only_here"]), ("Beta", &["dup"]), ("Gamma", &["dup"])]);

        let mut built = 0;
        let err = resolve_with(Some(&tools), false, |name, _| {
            built += 1;
            name
        })
        .unwrap_err();

        assert!(matches!(
            err,
            LlmError::ToolNameConflict { ref function, ref module } if function == "dup" && module == "Beta"
        ));
        assert_eq!(built, 0);
    }

    #[test]
    fn no_tools_builds_nothing() {
        let mut built = 0;
        let mut count = |name: String, _: &ToolDescriptor| {
            built += 1;
            name
        };

        assert!(resolve_with(None, true, &mut count).unwrap().is_none());
        assert!(resolve_with(Some(&ToolCatalog::new()), true, &mut count).unwrap().is_none());
        assert!(
            resolve_with(Some(&catalog(&[("Empty", &[])])), false, &mut count)
                .unwrap()
                .is_none()
        );
        assert_eq!(built, 0);
    }

    #[test]
    fn resolution_is_deterministic() {
        let tools = catalog(&[("X-1", &["go"]), ("X y", &["go"]), ("1X", &["go"])]);

        let first = names(&resolve(Some(&tools), true).unwrap().unwrap())
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        let second = names(&resolve(Some(&tools), true).unwrap().unwrap())
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();

        assert_eq!(first, second);
        assert_eq!(first, ["X_go", "Xy_go", "X2_go"]);
    }

    #[test]
    fn definition_uses_advertised_name() {
        let mut tools = ToolCatalog::new();
        tools.insert(
            "Weather".to_owned(),
            vec![tool("Weather", "lookup").with_parameter(ToolParameter::required("city", "string", "City"))],
        );
        tools.insert("Maps".to_owned(), vec![tool("Maps", "lookup")]);

        let resolved = resolve(Some(&tools), true).unwrap().unwrap();
        let definition = resolved[0].definition();

        assert_eq!(definition.name, "Weather_lookup");
        assert_eq!(definition.description, "Weather.lookup");
        assert_eq!(definition.parameters["required"], json!(["city"]));
    }

    #[tokio::test]
    async fn invoke_accepts_object_and_string_arguments() {
        let function = ResolvedFunction::new("echo".to_owned(), &tool("Util", "echo"));

        let from_object = function.invoke(&json!({"a": 1})).await.unwrap();
        assert_eq!(from_object, json!({"a": 1}));

        let from_string = function.invoke(&json!("{\"b\": 2}")).await.unwrap();
        assert_eq!(from_string, json!({"b": 2}));

        let from_null = function.invoke(&Value::Null).await.unwrap();
        assert_eq!(from_null, json!({}));

        let err = function.invoke(&json!("{\"b\": ")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
