//! End-to-end compile-and-render tests over template strings.

use super::*;
use crate::compile::{compile_source, CompileOutput};
use crate::config::EngineConfig;
use crate::error::StencilError;
use crate::ir::markers;
use crate::resource::{identity_hash, Source, TemplateReference};
use crate::security::AllowAll;
use crate::tags::{PluginKind, TagRegistry};
use serde_json::{json, Value};
use std::collections::HashMap;

fn compile(text: &str, registry: &TagRegistry) -> CompileOutput {
    let config = EngineConfig::new("templates", "compiled", "cache");
    let resolver = crate::resource::ResourceResolver::new(&config);
    let source = Source {
        reference: TemplateReference {
            kind: "string".to_string(),
            locator: text.to_string(),
        },
        content: text.to_string(),
        timestamp: None,
        uid: identity_hash(text),
        filepath: None,
    };
    compile_source(&source, &config, &resolver, &AllowAll, registry)
        .expect("compile failure")
}

fn render_with(
    text: &str,
    vars: HashMap<String, Value>,
    registry: &TagRegistry,
    plugins: &PluginRegistry,
) -> crate::error::Result<String> {
    let config = EngineConfig::new("templates", "compiled", "cache");
    let modifiers = ModifierRegistry::with_builtins();
    let output = compile(text, registry);
    let mut scopes = Scopes::with_root(vars);
    let mut renderer = Renderer::new(&config, &modifiers, plugins, &NoSubTemplates);
    renderer
        .render(&output.ops, &output.properties.function_defs, &mut scopes)
        .map(|rendered| rendered.text)
}

fn render(text: &str, vars: HashMap<String, Value>) -> String {
    render_with(
        text,
        vars,
        &TagRegistry::with_builtins(),
        &PluginRegistry::new(),
    )
    .expect("render failure")
}

fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn text_and_variables() {
    let out = render("Hello {$name}!", vars(&[("name", json!("world"))]));
    assert_eq!(out, "Hello world!");
}

#[test]
fn conditionals_pick_the_right_branch() {
    let tpl = "{if $n > 10}big{elseif $n > 5}medium{else}small{/if}";
    assert_eq!(render(tpl, vars(&[("n", json!(20))])), "big");
    assert_eq!(render(tpl, vars(&[("n", json!(7))])), "medium");
    assert_eq!(render(tpl, vars(&[("n", json!(1))])), "small");
}

#[test]
fn unbound_conditional_falls_through_to_else() {
    let text = "Hello {if $name}{$name}{else}World{/if}!";
    assert_eq!(
        render(text, vars(&[("name", json!("Bob"))])),
        "Hello Bob!"
    );
    assert_eq!(render(text, HashMap::new()), "Hello World!");
}

#[test]
fn foreach_iterates_with_properties() {
    let tpl = "{foreach $items as $it}{$it@iteration}:{$it}{if !$it@last},{/if}{/foreach}";
    let out = render(tpl, vars(&[("items", json!(["a", "b", "c"]))]));
    assert_eq!(out, "1:a,2:b,3:c");
}

#[test]
fn foreach_over_map_exposes_keys() {
    let tpl = "{foreach $map as $k => $v}{$k}={$v};{/foreach}";
    let out = render(tpl, vars(&[("map", json!({"a": 1, "b": 2}))]));
    assert_eq!(out, "a=1;b=2;");
}

#[test]
fn foreach_else_on_empty_input() {
    let tpl = "{foreach $items as $it}{$it}{foreachelse}none{/foreach}";
    assert_eq!(render(tpl, vars(&[("items", json!([]))])), "none");
    assert_eq!(render(tpl, HashMap::new()), "none");
}

#[test]
fn foreach_name_properties() {
    let tpl = "{foreach $items as $it name=outer}{$smarty.foreach.outer.total}{/foreach}";
    assert_eq!(render(tpl, vars(&[("items", json!([10, 20]))])), "22");
}

#[test]
fn for_range_counts_and_steps() {
    assert_eq!(render("{for $i=1 to 5}{$i}{/for}", HashMap::new()), "12345");
    assert_eq!(
        render("{for $i=10 to 1 step -3}{$i} {/for}", HashMap::new()),
        "10 7 4 1 "
    );
    assert_eq!(
        render("{for $i=5 to 1}x{forelse}empty{/for}", HashMap::new()),
        "empty"
    );
}

#[test]
fn while_loop_runs_until_false() {
    let tpl = "{while $n > 0}{$n}{assign var='n' value=$n - 1}{/while}done";
    assert_eq!(render(tpl, vars(&[("n", json!(3))])), "321done");
}

#[test]
fn section_indexes_rows() {
    let tpl = "{section name=i loop=$rows}{$rows[i]} {/section}";
    let out = render(tpl, vars(&[("rows", json!(["a", "b", "c"]))]));
    assert_eq!(out, "a b c ");
}

#[test]
fn section_start_step_max() {
    let tpl = "{section name=i loop=10 start=2 step=3 max=2}{$smarty.section.i.index},{/section}";
    assert_eq!(render(tpl, HashMap::new()), "2,5,");
}

#[test]
fn section_else_when_loop_is_empty() {
    let tpl = "{section name=i loop=$rows}x{sectionelse}nothing{/section}";
    assert_eq!(render(tpl, vars(&[("rows", json!([]))])), "nothing");
}

#[test]
fn capture_stores_and_replays() {
    let tpl = "{capture name='head'}<title>{$t}</title>{/capture}[{$smarty.capture.head}]";
    let out = render(tpl, vars(&[("t", json!("Home"))]));
    assert_eq!(out, "[<title>Home</title>]");
}

#[test]
fn capture_assign_sets_a_variable() {
    let tpl = "{capture assign='x'}ab{/capture}{$x}{$x}";
    assert_eq!(render(tpl, HashMap::new()), "abab");
}

#[test]
fn assign_and_append_build_values() {
    let tpl = "{assign var='x' value=2}{append var='l' value=$x}{append var='l' value=3}{$l|count}";
    assert_eq!(render(tpl, HashMap::new()), "2");
}

#[test]
fn template_function_with_defaults() {
    let tpl = "{function name=badge level=1}[{$label}:{$level}]{/function}\
               {badge label='a'}{badge label='b' level=9}";
    assert_eq!(render(tpl, HashMap::new()), "[a:1][b:9]");
}

#[test]
fn call_tag_can_capture_function_output() {
    let tpl = "{function name=row}<tr>{$x}</tr>{/function}\
               {call name=row x=5 assign='html'}{$html}";
    assert_eq!(render(tpl, HashMap::new()), "<tr>5</tr>");
}

#[test]
fn undefined_function_is_a_render_error() {
    // a definition can disappear between compile and render, e.g. a stale
    // artifact calling a function another template used to provide
    let ops = vec![crate::ir::Op::CallFunction {
        name: "ghost".to_string(),
        args: vec![],
        assign: None,
        line: 1,
    }];
    let config = EngineConfig::new("t", "c", "k");
    let modifiers = ModifierRegistry::with_builtins();
    let plugins = PluginRegistry::new();
    let mut scopes = Scopes::new();
    let mut renderer = Renderer::new(&config, &modifiers, &plugins, &NoSubTemplates);
    let err = renderer
        .render(&ops, &std::collections::BTreeMap::new(), &mut scopes)
        .unwrap_err();
    assert!(matches!(err, StencilError::RenderUndefinedFunction(_)));
}

#[test]
fn function_plugin_renders_through_callback() {
    let mut registry = TagRegistry::with_builtins();
    registry.register_plugin("repeat", PluginKind::Function);
    let mut plugins = PluginRegistry::new();
    plugins.register_function("repeat", |args| {
        let text = args
            .iter()
            .find(|(k, _)| k == "text")
            .map(|(_, v)| crate::runtime::value::stringify(v))
            .unwrap_or_default();
        let times = args
            .iter()
            .find(|(k, _)| k == "times")
            .and_then(|(_, v)| crate::runtime::value::as_integer(v))
            .unwrap_or(1);
        Ok(text.repeat(times.max(0) as usize))
    });
    let out = render_with(
        "{repeat text='ab' times=3}",
        HashMap::new(),
        &registry,
        &plugins,
    )
    .expect("render failure");
    assert_eq!(out, "ababab");
}

#[test]
fn block_plugin_transforms_its_body() {
    let mut registry = TagRegistry::with_builtins();
    registry.register_plugin("shout", PluginKind::Block);
    let mut plugins = PluginRegistry::new();
    plugins.register_block("shout", |_, body| Ok(body.to_uppercase()));
    let out = render_with(
        "a {shout}loud {$x}{/shout} z",
        vars(&[("x", json!("noise"))]),
        &registry,
        &plugins,
    )
    .expect("render failure");
    assert_eq!(out, "a LOUD NOISE z");
}

#[test]
fn include_renders_sub_template_inline() {
    struct Subs(HashMap<String, CompileOutput>);
    impl SubTemplates for Subs {
        fn load(&self, target: &str) -> crate::error::Result<IncludeUnit> {
            let compiled = self.0.get(target).ok_or_else(|| {
                StencilError::ResourceNotFound {
                    kind: "include".to_string(),
                    locator: target.to_string(),
                }
            })?;
            Ok(IncludeUnit {
                ops: compiled.ops.clone(),
                functions: compiled.properties.function_defs.clone(),
                dependencies: compiled.properties.file_dependency.clone(),
            })
        }
    }
    let registry = TagRegistry::with_builtins();
    let mut map = HashMap::new();
    map.insert("part.tpl".to_string(), compile("[{$who}]", &registry));
    let subs = Subs(map);

    let config = EngineConfig::new("t", "c", "k");
    let modifiers = ModifierRegistry::with_builtins();
    let plugins = PluginRegistry::new();
    let output = compile("pre {include file='part.tpl' who='me'} post", &registry);
    let mut scopes = Scopes::new();
    let mut renderer = Renderer::new(&config, &modifiers, &plugins, &subs);
    let rendered = renderer
        .render(&output.ops, &output.properties.function_defs, &mut scopes)
        .expect("render failure");
    assert_eq!(rendered.text, "pre [me] post");
    // include vars stay local to the sub-template
    assert_eq!(scopes.get("who"), None);
}

#[test]
fn caching_brackets_nocache_units_with_markers() {
    let registry = TagRegistry::with_builtins();
    let output = compile("a{nocache}{$x}{/nocache}b", &registry);
    let config = EngineConfig::new("t", "c", "k");
    let modifiers = ModifierRegistry::with_builtins();
    let plugins = PluginRegistry::new();
    let mut scopes = Scopes::with_root(vars(&[("x", json!("fresh"))]));
    let mut renderer =
        Renderer::new(&config, &modifiers, &plugins, &NoSubTemplates).with_caching("cafe01");
    let rendered = renderer
        .render(&output.ops, &output.properties.function_defs, &mut scopes)
        .expect("render failure");
    let expected = format!(
        "a{}fresh{}b",
        markers::open("cafe01", 0),
        markers::close("cafe01", 0)
    );
    assert_eq!(rendered.text, expected);
    assert_eq!(rendered.units.len(), 1);
}

#[test]
fn without_caching_no_markers_appear() {
    let registry = TagRegistry::with_builtins();
    let output = compile("a{nocache}{$x}{/nocache}b", &registry);
    let config = EngineConfig::new("t", "c", "k");
    let modifiers = ModifierRegistry::with_builtins();
    let plugins = PluginRegistry::new();
    let mut scopes = Scopes::with_root(vars(&[("x", json!("v"))]));
    let mut renderer = Renderer::new(&config, &modifiers, &plugins, &NoSubTemplates);
    let rendered = renderer
        .render(&output.ops, &output.properties.function_defs, &mut scopes)
        .expect("render failure");
    assert_eq!(rendered.text, "avb");
    assert!(rendered.units.is_empty());
}

#[test]
fn tainted_variable_reads_become_their_own_units() {
    let registry = TagRegistry::with_builtins();
    let tpl = "{nocache}{assign var='t' value=$x}{/nocache}-{$t}-";
    let output = compile(tpl, &registry);
    let config = EngineConfig::new("t", "c", "k");
    let modifiers = ModifierRegistry::with_builtins();
    let plugins = PluginRegistry::new();
    let mut scopes = Scopes::with_root(vars(&[("x", json!("live"))]));
    let mut renderer =
        Renderer::new(&config, &modifiers, &plugins, &NoSubTemplates).with_caching("cafe02");
    let rendered = renderer
        .render(&output.ops, &output.properties.function_defs, &mut scopes)
        .expect("render failure");
    // the later read of $t is re-evaluated per request, so it renders
    // inside its own marker pair
    assert_eq!(rendered.units.len(), 2);
    assert!(rendered.text.contains(&markers::open("cafe02", 1)));
    assert!(rendered.text.contains("-"));
}

#[test]
fn capture_suppresses_markers_inside_its_body() {
    let registry = TagRegistry::with_builtins();
    let tpl = "{capture assign='c'}{nocache}{$x}{/nocache}{/capture}{$c}";
    let output = compile(tpl, &registry);
    let config = EngineConfig::new("t", "c", "k");
    let modifiers = ModifierRegistry::with_builtins();
    let plugins = PluginRegistry::new();
    let mut scopes = Scopes::with_root(vars(&[("x", json!("v"))]));
    let mut renderer =
        Renderer::new(&config, &modifiers, &plugins, &NoSubTemplates).with_caching("cafe03");
    let rendered = renderer
        .render(&output.ops, &output.properties.function_defs, &mut scopes)
        .expect("render failure");
    assert!(!rendered.text.contains(markers::OPEN_PREFIX));
}

#[test]
fn modifier_pipeline_in_output() {
    let out = render(
        "{$name|lower|capitalize}",
        vars(&[("name", json!("ADA LOVELACE"))]),
    );
    assert_eq!(out, "Ada Lovelace");
}

#[test]
fn literal_and_delimiter_tags() {
    assert_eq!(
        render("{literal}{$x}{/literal}{ldelim}$x{rdelim}", HashMap::new()),
        "{$x}{$x}"
    );
}
