//! Rendering of the generated registry module.

use std::fmt::Write;

use crate::codegen::decl::ProviderDecl;

const HEADER: &str = "\
// @generated by provident. Do not edit by hand.
//
// Regenerate with `provident generate`.
";

/// Renders the registry module for the given declarations, in declaration
/// order.
///
/// Hidden declarations are registered like any other (they resolve at
/// runtime) but are omitted from the `keys` constants and `types` aliases
/// that make up the public surface.
pub(crate) fn render(decls: &[ProviderDecl]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    out.push_str("use std::collections::HashMap;\n");
    out.push_str("use std::sync::Arc;\n\n");
    out.push_str("use provident::{ErasedInstance, Key, Registry, RegistryBuilder, ScopeId};\n\n");

    let visible: Vec<&ProviderDecl> = decls.iter().filter(|decl| !decl.hidden).collect();

    out.push_str("/// Keys of every generated provider.\n");
    out.push_str("pub mod keys {\n");
    for decl in &visible {
        let _ = writeln!(
            out,
            "    pub const {}: &str = \"{}\";",
            const_name(&decl.key),
            decl.key
        );
    }
    out.push_str("}\n\n");

    out.push_str("/// Instance types keyed by provider.\n");
    out.push_str("pub mod types {\n");
    for decl in &visible {
        if let Some(instance_type) = &decl.instance_type {
            let _ = writeln!(
                out,
                "    pub type {} = {};",
                type_alias(&decl.key),
                instance_type
            );
        }
    }
    out.push_str("}\n\n");

    out.push_str("/// Builds the registry from every discovered provider declaration.\n");
    out.push_str("pub fn install() -> Arc<Registry> {\n");
    out.push_str("    RegistryBuilder::new()\n");
    for decl in decls {
        let _ = writeln!(out, "        .register({}())", decl.constructor);
    }
    out.push_str("        .build()\n");
    out.push_str("}\n\n");

    out.push_str("/// Builds every provider flagged eager, returning key -> instance.\n");
    out.push_str(
        "pub async fn startup(registry: &Registry) -> provident::Result<HashMap<Key, ErasedInstance>> {\n",
    );
    out.push_str("    registry.startup(ScopeId::default()).await\n");
    out.push_str("}\n");
    out
}

/// `database-pool` → `DATABASE_POOL`.
fn const_name(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// `database-pool` → `DatabasePool`.
fn type_alias(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = true;
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            if upper_next {
                out.extend(c.to_uppercase());
                upper_next = false;
            } else {
                out.push(c);
            }
        } else {
            upper_next = true;
        }
    }
    out
}
