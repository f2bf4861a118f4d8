use super::*;
use crate::config::EngineConfig;
use crate::parser::{Expr, Literal};
use crate::resource::{identity_hash, Source, TemplateReference};
use crate::security::AllowAll;
use crate::tags::PluginKind;
use std::fs;
use tempfile::TempDir;

fn string_source(text: &str) -> Source {
    Source {
        reference: TemplateReference {
            kind: "string".to_string(),
            locator: text.to_string(),
        },
        content: text.to_string(),
        timestamp: None,
        uid: identity_hash(text),
        filepath: None,
    }
}

fn compile_str(text: &str) -> Result<CompileOutput> {
    let config = EngineConfig::new("templates", "compiled", "cache");
    let resolver = ResourceResolver::new(&config);
    let registry = TagRegistry::with_builtins();
    compile_source(&string_source(text), &config, &resolver, &AllowAll, &registry)
}

fn ops_of(text: &str) -> Vec<Op> {
    compile_str(text).expect("compile failure").ops
}

fn flatten_text(ops: &[Op]) -> String {
    let mut out = String::new();
    for op in ops {
        if let Op::Text(text) = op {
            out.push_str(text);
        }
    }
    out
}

fn compile_filtered(text: &str, filters: &Filters) -> Result<CompileOutput> {
    let config = EngineConfig::new("templates", "compiled", "cache");
    let resolver = ResourceResolver::new(&config);
    let registry = TagRegistry::with_builtins();
    compile_source_with(
        &string_source(text),
        &config,
        &resolver,
        &AllowAll,
        &registry,
        filters,
    )
}

#[test]
fn text_and_print_interleave() {
    let ops = ops_of("Hello {$name}!");
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0], Op::Text("Hello ".to_string()));
    assert!(matches!(ops[1], Op::Emit { .. }));
    assert_eq!(ops[2], Op::Text("!".to_string()));
}

#[test]
fn if_elseif_else_builds_branches() {
    let ops = ops_of("{if $a}A{elseif $b}B{else}C{/if}");
    match &ops[0] {
        Op::If {
            branches,
            otherwise,
        } => {
            assert_eq!(branches.len(), 2);
            assert_eq!(branches[0].1, vec![Op::Text("A".to_string())]);
            assert_eq!(branches[1].1, vec![Op::Text("B".to_string())]);
            assert_eq!(otherwise, &vec![Op::Text("C".to_string())]);
        }
        other => panic!("expected if op, got {:?}", other),
    }
}

#[test]
fn unclosed_construct_is_fatal() {
    assert!(matches!(
        compile_str("{if $a}body"),
        Err(StencilError::TagUnclosed { .. })
    ));
}

#[test]
fn mismatched_close_is_fatal() {
    assert!(matches!(
        compile_str("{if $a}{foreach $x as $y}{/if}{/foreach}"),
        Err(StencilError::TagMismatched { .. })
    ));
}

#[test]
fn stray_close_is_fatal() {
    assert!(matches!(
        compile_str("text{/if}"),
        Err(StencilError::TagUnexpectedClose { .. })
    ));
}

#[test]
fn foreach_with_else_branch() {
    let ops = ops_of("{foreach $items as $item}x{foreachelse}empty{/foreach}");
    match &ops[0] {
        Op::Foreach {
            item,
            body,
            else_body,
            ..
        } => {
            assert_eq!(item, "item");
            assert_eq!(body, &vec![Op::Text("x".to_string())]);
            assert_eq!(else_body, &vec![Op::Text("empty".to_string())]);
        }
        other => panic!("expected foreach op, got {:?}", other),
    }
}

#[test]
fn for_range_with_step() {
    let ops = ops_of("{for $i=1 to 10 step 2}{$i}{/for}");
    match &ops[0] {
        Op::ForRange { var, step, .. } => {
            assert_eq!(var, "i");
            assert!(step.is_some());
        }
        other => panic!("expected for op, got {:?}", other),
    }
}

#[test]
fn nocache_block_wraps_body_and_sets_flag() {
    let output = compile_str("a{nocache}{$x}{/nocache}b").expect("compile failure");
    assert!(output.properties.has_nocache_code);
    match &output.ops[1] {
        Op::Nocache { body } => assert!(matches!(body[0], Op::Emit { .. })),
        other => panic!("expected nocache op, got {:?}", other),
    }
}

#[test]
fn nocache_attr_on_print_wraps_emit() {
    let ops = ops_of("{$x nocache}");
    assert!(matches!(&ops[0], Op::Nocache { body } if matches!(body[0], Op::Emit { .. })));
}

#[test]
fn nested_construct_inherits_nocache_flag() {
    // a conditional inside a nocache region becomes part of the unit
    let ops = ops_of("{nocache}{if $a}x{/if}{/nocache}");
    match &ops[0] {
        Op::Nocache { body } => match &body[0] {
            // inner wrap is harmless; the op must sit inside the unit
            Op::If { .. } | Op::Nocache { .. } => {}
            other => panic!("expected conditional inside unit, got {:?}", other),
        },
        other => panic!("expected nocache op, got {:?}", other),
    }
}

#[test]
fn literal_region_compiles_to_text() {
    let ops = ops_of("a{literal}{$x}{/literal}b");
    assert_eq!(ops, vec![Op::Text("a{$x}b".to_string())]);
}

#[test]
fn function_definition_is_hoisted() {
    let output =
        compile_str("{function name=greet who='world'}Hi {$who}{/function}{greet who='you'}")
            .expect("compile failure");
    let def = output
        .properties
        .function_defs
        .get("greet")
        .expect("definition recorded");
    assert_eq!(def.params.len(), 1);
    assert_eq!(def.params[0].0, "who");
    assert!(matches!(output.ops[0], Op::CallFunction { .. }));
}

#[test]
fn call_before_definition_resolves() {
    let output = compile_str("{greet}{function name=greet}hi{/function}").expect("compile failure");
    assert!(output.properties.function_defs.contains_key("greet"));
}

#[test]
fn unknown_tag_is_fatal_after_the_pass() {
    assert!(matches!(
        compile_str("{definitely_not_a_tag}"),
        Err(StencilError::TagUnknown { .. })
    ));
}

#[test]
fn registered_function_plugin_compiles_to_plugin_call() {
    let config = EngineConfig::new("templates", "compiled", "cache");
    let resolver = ResourceResolver::new(&config);
    let mut registry = TagRegistry::with_builtins();
    registry.register_plugin("now_stamp", PluginKind::Function);
    let output = compile_source(
        &string_source("{now_stamp format='%Y'}"),
        &config,
        &resolver,
        &AllowAll,
        &registry,
    )
    .expect("compile failure");
    assert!(matches!(&output.ops[0], Op::CallPlugin { name, .. } if name == "now_stamp"));
}

#[test]
fn block_plugin_wraps_its_body() {
    let config = EngineConfig::new("templates", "compiled", "cache");
    let resolver = ResourceResolver::new(&config);
    let mut registry = TagRegistry::with_builtins();
    registry.register_plugin("shout", PluginKind::Block);
    let output = compile_source(
        &string_source("{shout level=3}hi{/shout}"),
        &config,
        &resolver,
        &AllowAll,
        &registry,
    )
    .expect("compile failure");
    match &output.ops[0] {
        Op::BlockPlugin { name, args, body, .. } => {
            assert_eq!(name, "shout");
            assert_eq!(args.len(), 1);
            assert_eq!(body, &vec![Op::Text("hi".to_string())]);
        }
        other => panic!("expected block plugin op, got {:?}", other),
    }
}

#[test]
fn include_of_literal_target_records_dependency() {
    let dir = TempDir::new().expect("tempdir");
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).expect("mkdir");
    fs::write(templates.join("part.tpl"), "partial").expect("write");
    let config = EngineConfig::new(
        &templates,
        dir.path().join("compiled"),
        dir.path().join("cache"),
    );
    let resolver = ResourceResolver::new(&config);
    let registry = TagRegistry::with_builtins();
    let output = compile_source(
        &string_source("{include file='part.tpl'}"),
        &config,
        &resolver,
        &AllowAll,
        &registry,
    )
    .expect("compile failure");
    assert!(matches!(output.ops[0], Op::Include { .. }));
    let recorded = output
        .properties
        .file_dependency
        .values()
        .any(|dep| dep.locator.ends_with("part.tpl"));
    assert!(recorded, "include dependency missing");
}

fn inheritance_fixture(dir: &TempDir, child: &str, parent: &str) -> (EngineConfig, Source) {
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).expect("mkdir");
    fs::write(templates.join("child.tpl"), child).expect("write");
    fs::write(templates.join("parent.tpl"), parent).expect("write");
    let config = EngineConfig::new(
        &templates,
        dir.path().join("compiled"),
        dir.path().join("cache"),
    );
    let resolver = ResourceResolver::new(&config);
    let source = resolver
        .load("child.tpl", &config, &AllowAll)
        .expect("load failure");
    (config, source)
}

#[test]
fn extends_merges_child_block_into_parent() {
    let dir = TempDir::new().expect("tempdir");
    let (config, source) = inheritance_fixture(
        &dir,
        "{extends file='parent.tpl'}{block name=title}Child Title{/block}",
        "<h1>{block name=title}Default{/block}</h1>",
    );
    let resolver = ResourceResolver::new(&config);
    let registry = TagRegistry::with_builtins();
    let output =
        compile_source(&source, &config, &resolver, &AllowAll, &registry).expect("compile failure");
    assert_eq!(flatten_text(&output.ops), "<h1>Child Title</h1>");
    // both chain members are dependencies
    assert!(output.properties.file_dependency.len() >= 2);
}

#[test]
fn extends_parent_marker_merges_bodies() {
    let dir = TempDir::new().expect("tempdir");
    let (config, source) = inheritance_fixture(
        &dir,
        "{extends file='parent.tpl'}{block name=x}child{/block}",
        "{block name=x}parent-{$smarty.block.parent}{/block}",
    );
    let resolver = ResourceResolver::new(&config);
    let registry = TagRegistry::with_builtins();
    let output =
        compile_source(&source, &config, &resolver, &AllowAll, &registry).expect("compile failure");
    assert_eq!(flatten_text(&output.ops), "parent-child");
}

#[test]
fn extends_cycle_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let (config, source) = inheritance_fixture(
        &dir,
        "{extends file='parent.tpl'}",
        "{extends file='parent.tpl'}x",
    );
    let resolver = ResourceResolver::new(&config);
    let registry = TagRegistry::with_builtins();
    assert!(matches!(
        compile_source(&source, &config, &resolver, &AllowAll, &registry),
        Err(StencilError::InheritCycle(_))
    ));
}

#[test]
fn assign_scope_parses() {
    let ops = ops_of("{assign var='x' value=42 scope='root'}");
    assert_eq!(
        ops,
        vec![Op::Assign {
            var: "x".to_string(),
            value: Expr::Literal(Literal::Int(42)),
            scope: crate::ir::AssignScope::Root,
        }]
    );
}

#[test]
fn ldelim_rdelim_emit_delimiters() {
    let ops = ops_of("{ldelim}x{rdelim}");
    assert_eq!(flatten_text(&ops), "{x}");
}

#[test]
fn prefilters_rewrite_source_before_lexing() {
    let mut filters = Filters::default();
    filters.register_prefilter(|text| text.replace("[[", "{").replace("]]", "}"));
    let output = compile_filtered("v=[[$x]]", &filters).expect("compile failure");
    assert_eq!(output.ops.len(), 2);
    assert_eq!(output.ops[0], Op::Text("v=".to_string()));
    assert!(matches!(output.ops[1], Op::Emit { .. }));
}

#[test]
fn prefilters_chain_in_registration_order() {
    let mut filters = Filters::default();
    filters.register_prefilter(|text| format!("{text}b"));
    filters.register_prefilter(|text| format!("{text}c"));
    let output = compile_filtered("a", &filters).expect("compile failure");
    assert_eq!(flatten_text(&output.ops), "abc");
}

#[test]
fn postfilters_transform_the_finished_ops() {
    let mut filters = Filters::default();
    filters.register_postfilter(|mut ops| {
        ops.push(Op::Text(" -- footer".to_string()));
        ops
    });
    let output = compile_filtered("body", &filters).expect("compile failure");
    assert_eq!(flatten_text(&output.ops), "body -- footer");
}
