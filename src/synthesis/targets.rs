//! Test target designation.
//!
//! Every function and method is a unit target. Functions whose call
//! fan-out exceeds a threshold are also integration targets, and so are
//! classes whose methods collectively exceed the class threshold.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::analysis::{FunctionInfo, ModuleStructure, Parameter};

/// Fan-out thresholds for integration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOut {
    /// A function with more distinct call targets than this is an
    /// integration target.
    pub function: usize,
    /// Same, for the union over a class's methods.
    pub class: usize,
}

impl Default for FanOut {
    fn default() -> Self {
        Self { function: 2, class: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Function,
    Method,
    Class,
}

/// Something tests are synthesized for.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    /// Owning class of a method.
    pub owner: Option<String>,
    pub kind: TargetKind,
    /// The callable itself; `None` for class targets.
    pub function: Option<FunctionInfo>,
    pub start_line: usize,
    pub end_line: usize,
    pub dependencies: BTreeSet<String>,
    pub integration: bool,
}

impl Target {
    fn callable(func: &FunctionInfo, owner: Option<&str>, fan_out: usize) -> Self {
        Self {
            name: func.name.clone(),
            owner: owner.map(str::to_string),
            kind: if owner.is_some() {
                TargetKind::Method
            } else {
                TargetKind::Function
            },
            function: Some(func.clone()),
            start_line: func.start_line,
            end_line: func.end_line,
            dependencies: func.dependencies.clone(),
            integration: func.dependencies.len() > fan_out,
        }
    }

    /// `Owner.name` for methods, the plain name otherwise.
    pub fn label(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{}.{}", owner, self.name),
            None => self.name.clone(),
        }
    }

    /// File-name-safe form of the label.
    pub fn file_stem(&self) -> String {
        self.label().replace('.', "_")
    }

    /// Names a test file must import to reach this target.
    pub fn import_symbol(&self) -> &str {
        self.owner.as_deref().unwrap_or(&self.name)
    }

    pub fn complexity(&self) -> u32 {
        self.function.as_ref().map_or(1, |f| f.complexity)
    }

    pub fn parameters(&self) -> &[Parameter] {
        self.function.as_ref().map_or(&[], |f| f.parameters.as_slice())
    }

    pub fn is_async(&self) -> bool {
        self.function.as_ref().is_some_and(|f| f.is_async)
    }

    /// Source lines covered by the target.
    pub fn snippet(&self, source: &str) -> String {
        source
            .lines()
            .skip(self.start_line.saturating_sub(1))
            .take(self.end_line + 1 - self.start_line.max(1))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Metadata handed to the test body generator.
    pub fn metadata(&self) -> TargetMetadata {
        let func = self.function.as_ref();
        TargetMetadata {
            name: self.name.clone(),
            owner: self.owner.clone(),
            kind: self.kind,
            parameters: self.parameters().to_vec(),
            return_type: func.map(|f| f.return_type.clone()),
            complexity: self.complexity(),
            is_async: self.is_async(),
            dependencies: self.dependencies.iter().cloned().collect(),
            integration: self.integration,
            test_candidates: func.map(|f| f.test_candidates.clone()).unwrap_or_default(),
        }
    }
}

/// Serializable description of a target for the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMetadata {
    pub name: String,
    pub owner: Option<String>,
    pub kind: TargetKind,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub complexity: u32,
    pub is_async: bool,
    pub dependencies: Vec<String>,
    pub integration: bool,
    pub test_candidates: Vec<String>,
}

/// Targets in source order: functions, then each class's methods followed
/// by the class itself when it is an integration target.
pub fn designate_targets(structure: &ModuleStructure, fan_out: &FanOut) -> Vec<Target> {
    let mut targets: Vec<Target> = structure
        .functions
        .iter()
        .map(|f| Target::callable(f, None, fan_out.function))
        .collect();

    for class in &structure.classes {
        targets.extend(
            class
                .methods
                .iter()
                .map(|m| Target::callable(m, Some(&class.name), fan_out.function)),
        );
        let dependencies = class.dependencies();
        if dependencies.len() > fan_out.class {
            targets.push(Target {
                name: class.name.clone(),
                owner: None,
                kind: TargetKind::Class,
                function: None,
                start_line: class.start_line,
                end_line: class.end_line,
                dependencies,
                integration: true,
            });
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ClassInfo;

    fn func(name: &str, deps: &[&str]) -> FunctionInfo {
        let mut f = FunctionInfo::new(name, 1, 3);
        f.dependencies = deps.iter().map(|d| d.to_string()).collect();
        f
    }

    #[test]
    fn test_function_fan_out() {
        let mut structure = ModuleStructure::default();
        structure.functions.push(func("small", &["a", "b"]));
        structure.functions.push(func("wide", &["a", "b", "c"]));

        let targets = designate_targets(&structure, &FanOut::default());
        let flags: Vec<_> = targets.iter().map(|t| (t.name.as_str(), t.integration)).collect();
        assert_eq!(flags, vec![("small", false), ("wide", true)]);
    }

    #[test]
    fn test_class_fan_out_adds_class_target() {
        let mut structure = ModuleStructure::default();
        let mut class = ClassInfo::new("Checkout", 1, 20);
        class.methods.push(func("price", &["tax", "discount"]));
        class.methods.push(func("pay", &["charge", "receipt"]));
        structure.classes.push(class);

        let targets = designate_targets(&structure, &FanOut::default());
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].label(), "Checkout.price");
        assert!(!targets[0].integration);
        assert_eq!(targets[2].kind, TargetKind::Class);
        assert!(targets[2].integration);
        assert_eq!(targets[2].dependencies.len(), 4);
    }

    #[test]
    fn test_snippet_takes_target_lines() {
        let mut f = FunctionInfo::new("f", 2, 3);
        f.complexity = 1;
        let target = Target::callable(&f, None, 2);
        assert_eq!(target.snippet("a\nb\nc\nd\n"), "b\nc");
        assert_eq!(target.file_stem(), "f");
    }
}
