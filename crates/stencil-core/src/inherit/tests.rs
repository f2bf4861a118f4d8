use super::*;

fn scan(source: &str) -> Vec<ScannedBlock> {
    scan_blocks(source, "test.tpl", "{", "}").expect("scan failure")
}

#[test]
fn scans_simple_block() {
    let blocks = scan("head{block name=title}Default{/block}tail");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].name, "title");
    assert_eq!(blocks[0].mode, MergeMode::Replace);
    assert_eq!(blocks[0].body, "Default");
}

#[test]
fn scans_nested_blocks_with_depth_counting() {
    let blocks = scan("{block name=outer}a{block name=inner}b{/block}c{/block}");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].name, "outer");
    assert_eq!(blocks[0].body, "a{block name=inner}b{/block}c");
}

#[test]
fn scans_sibling_blocks() {
    let blocks = scan("{block name=a}1{/block}mid{block name=b append}2{/block}");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].name, "a");
    assert_eq!(blocks[1].name, "b");
    assert_eq!(blocks[1].mode, MergeMode::Append);
}

#[test]
fn blockquote_text_is_not_an_open_tag() {
    let blocks = scan("{blockquote}x{block name=a}1{/block}");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].name, "a");
}

#[test]
fn unbalanced_blocks_are_fatal() {
    assert!(scan_blocks("{block name=a}body", "t.tpl", "{", "}").is_err());
    assert!(scan_blocks("text{/block}", "t.tpl", "{", "}").is_err());
}

#[test]
fn child_override_replaces_ancestor() {
    let mut table = BlockOverrideTable::new();
    table.register_all("child.tpl", scan("{block name=x}child{/block}"), "{", "}");
    table.register_all("parent.tpl", scan("{block name=x}parent{/block}"), "{", "}");
    assert_eq!(
        table.effective("x", "parent", "{", "}").as_deref(),
        Some("child")
    );
}

#[test]
fn ancestor_marker_is_replaced_by_child_content() {
    let mut table = BlockOverrideTable::new();
    table.register_all("child.tpl", scan("{block name=x}child{/block}"), "{", "}");
    // final ancestor body is handed in at compile time
    assert_eq!(
        table
            .effective("x", "parent-{$smarty.block.parent}", "{", "}")
            .as_deref(),
        Some("parent-child")
    );
}

#[test]
fn mid_chain_marker_absorbs_derived_content() {
    let mut table = BlockOverrideTable::new();
    table.register_all("child.tpl", scan("{block name=x}child{/block}"), "{", "}");
    table.register_all(
        "mid.tpl",
        scan("{block name=x}[{$smarty.block.parent}]{/block}"),
        "{",
        "}",
    );
    // the merged entry now replaces even a markerless base body
    assert_eq!(
        table.effective("x", "base", "{", "}").as_deref(),
        Some("[child]")
    );
}

#[test]
fn append_mode_is_child_then_ancestor() {
    let mut table = BlockOverrideTable::new();
    table.register_all(
        "child.tpl",
        scan("{block name=x append}child{/block}"),
        "{",
        "}",
    );
    assert_eq!(
        table.effective("x", "parent", "{", "}").as_deref(),
        Some("childparent")
    );
}

#[test]
fn prepend_mode_is_ancestor_then_child() {
    let mut table = BlockOverrideTable::new();
    table.register_all(
        "child.tpl",
        scan("{block name=x prepend}child{/block}"),
        "{",
        "}",
    );
    assert_eq!(
        table.effective("x", "parent", "{", "}").as_deref(),
        Some("parentchild")
    );
}

#[test]
fn append_mode_skips_marker_substitution() {
    let mut table = BlockOverrideTable::new();
    table.register_all(
        "child.tpl",
        scan("{block name=x append}child{/block}"),
        "{",
        "}",
    );
    table.register_all(
        "parent.tpl",
        scan("{block name=x}parent-{$smarty.block.parent}{/block}"),
        "{",
        "}",
    );
    // append takes the ancestor's own body text, not the merged form
    assert_eq!(
        table.effective("x", "unused", "{", "}").as_deref(),
        Some("childparent-{$smarty.block.parent}")
    );
}

#[test]
fn three_level_marker_chain_merges_stepwise() {
    let mut table = BlockOverrideTable::new();
    table.register_all("a.tpl", scan("{block name=x}A{/block}"), "{", "}");
    table.register_all(
        "b.tpl",
        scan("{block name=x}B+{$smarty.block.parent}{/block}"),
        "{",
        "}",
    );
    assert_eq!(
        table
            .effective("x", "C+{$smarty.block.parent}", "{", "}")
            .as_deref(),
        Some("C+B+A")
    );
}
