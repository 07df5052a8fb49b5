//! Protection registry: guarded program name -> password

use std::collections::BTreeMap;

use crate::models::{Password, ProcessName};

#[derive(Debug, Clone, Default)]
pub struct ProtectionRegistry {
    programs: BTreeMap<ProcessName, Password>,
}

impl ProtectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or silently overwrite. Returns true when an entry was replaced.
    pub fn register(&mut self, name: ProcessName, password: Password) -> bool {
        self.programs.insert(name, password).is_some()
    }

    pub fn unregister(&mut self, name: &ProcessName) -> Option<Password> {
        self.programs.remove(name)
    }

    pub fn is_guarded(&self, name: &ProcessName) -> bool {
        self.programs.contains_key(name)
    }

    pub fn password_for(&self, name: &ProcessName) -> Option<&Password> {
        self.programs.get(name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProcessName, &Password)> {
        self.programs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ProtectionRegistry::new();
        assert!(!registry.register(ProcessName::new("Notepad.exe"), Password::new("pw1")));

        let name = ProcessName::new("notepad.exe");
        assert!(registry.is_guarded(&name));
        assert!(registry.password_for(&name).unwrap().matches("pw1"));
        assert!(!registry.is_guarded(&ProcessName::new("calc.exe")));
    }

    #[test]
    fn test_register_overwrites_silently() {
        let mut registry = ProtectionRegistry::new();
        registry.register(ProcessName::new("a.exe"), Password::new("old"));
        assert!(registry.register(ProcessName::new("A.EXE"), Password::new("new")));

        assert_eq!(registry.len(), 1);
        let password = registry.password_for(&ProcessName::new("a.exe")).unwrap();
        assert!(password.matches("new"));
        assert!(!password.matches("old"));
    }

    #[test]
    fn test_unregister() {
        let mut registry = ProtectionRegistry::new();
        registry.register(ProcessName::new("a.exe"), Password::new("pw"));

        assert!(registry.unregister(&ProcessName::new("a.exe")).is_some());
        assert!(registry.unregister(&ProcessName::new("a.exe")).is_none());
        assert!(registry.is_empty());
    }
}
