//! Tool Registry - name-keyed, append-only collection of tools.
//!
//! Reads take a shared lock and clone an `Arc<Tool>` out, so no lock is held
//! while a handler runs. Registration takes the exclusive lock and either
//! inserts the whole tool or leaves the map untouched.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::error::ToolError;
use super::handlers::{Tool, ToolInfo};

/// Registry of all available tools.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<Tool>>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its name.
    ///
    /// Fails with [`ToolError::Validation`] for an empty or malformed name and
    /// [`ToolError::DuplicateTool`] if the name is taken.
    pub fn register(&self, tool: Tool) -> Result<(), ToolError> {
        validate_name(tool.name())?;

        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.contains_key(tool.name()) {
            return Err(ToolError::duplicate(tool.name()));
        }
        tools.insert(tool.name().to_string(), Arc::new(tool));
        Ok(())
    }

    /// Look a tool up by name.
    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Independent snapshot of all tools, ordered by name.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|t| t.info())
            .collect()
    }

    /// Get all tool names.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tool names are non-empty and limited to `[A-Za-z0-9_-]`.
pub fn validate_name(name: &str) -> Result<(), ToolError> {
    if name.is_empty() {
        return Err(ToolError::validation("tool name must not be empty"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(ToolError::validation(format!(
            "invalid character {c:?} in tool name {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::handler_fn;
    use serde_json::Value;
    use std::thread;

    fn tool(name: &str) -> Tool {
        Tool::new(name, format!("{name} tool"), handler_fn(|_, _| async { Ok(Value::Null) }))
    }

    #[test]
    fn test_register_and_get() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(tool("echo")).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().name(), "echo");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_leaves_registry_unchanged() {
        let registry = ToolRegistry::new();
        registry.register(tool("echo")).unwrap();

        let dup = Tool::new("echo", "other", handler_fn(|_, _| async { Ok(Value::Null) }));
        let err = registry.register(dup).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateTool(ref n) if n == "echo"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().description(), "echo tool");
    }

    #[test]
    fn test_invalid_names_rejected() {
        let registry = ToolRegistry::new();
        for bad in ["", "has space", "slash/name", "dot.name", "ünicode"] {
            let err = registry.register(tool(bad)).unwrap_err();
            assert!(matches!(err, ToolError::Validation(_)), "{bad:?} should be rejected");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_valid_name_charset() {
        assert!(validate_name("get_user-2").is_ok());
        assert!(validate_name("ABC").is_ok());
    }

    #[test]
    fn test_list_is_sorted_snapshot() {
        let registry = ToolRegistry::new();
        registry.register(tool("zeta")).unwrap();
        registry.register(tool("alpha")).unwrap();

        let snapshot = registry.list();
        registry.register(tool("mid")).unwrap();

        let names: Vec<_> = snapshot.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(registry.tool_names(), ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_concurrent_register_and_read() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(tool("base")).unwrap();

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || registry.register(tool(&format!("t{i}"))).unwrap())
            })
            .collect();
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(registry.get("base").is_some());
                        let _ = registry.list();
                    }
                })
            })
            .collect();

        for h in writers.into_iter().chain(readers) {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 9);
    }
}
