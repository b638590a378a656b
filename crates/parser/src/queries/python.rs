//! Python tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::compile_query;
use crate::parser::LanguageQueries;

/// Import extraction query for Python
const IMPORTS_QUERY: &str = r#"
; import foo
(import_statement
  name: (dotted_name) @import)

; import foo, bar
(import_statement
  name: (dotted_name) @import)

; from foo import bar
(import_from_statement
  module_name: (dotted_name) @import)

; from foo import bar, baz
(import_from_statement
  module_name: (dotted_name) @import)

; from . import foo (relative imports)
(import_from_statement
  module_name: (relative_import) @import)
"#;

/// Call extraction query for Python
const CALLS_QUERY: &str = r#"
; Direct function calls: foo()
(call
  function: (identifier) @call)

; Method/attribute calls: obj.method()
(call
  function: (attribute
    attribute: (identifier) @call))

; Chained calls: obj.foo().bar()
(call
  function: (attribute
    object: (call)
    attribute: (identifier) @call))

; Decorators are effectively calls: @decorator, @property
(decorator
  (identifier) @call)

; Decorator with call: @decorator(arg)
(decorator
  (call
    function: (identifier) @call))

; Decorator with attribute: @module.decorator
(decorator
  (attribute
    attribute: (identifier) @call))
"#;

/// Definition extraction query for Python
const DEFINITIONS_QUERY: &str = r#"
; Functions
(function_definition
  name: (identifier) @name) @definition.function

; Async functions
(function_definition
  name: (identifier) @name) @definition.function

; Classes
(class_definition
  name: (identifier) @name) @definition.class

; Methods (inside class)
(class_definition
  body: (block
    (function_definition
      name: (identifier) @name) @definition.method))
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    imports: compile_query(grammar, IMPORTS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
  }
}
