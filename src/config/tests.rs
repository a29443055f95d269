//! Unit tests for layered value resolution, merging, and provenance.

use anyhow::{Result, ensure};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::error::{ErrorKind, MicrocosmError};

use super::{ConfigChild, ConfigNode, ConfigTree, ProvenanceEntry};

fn layers(names: &[&str]) -> Vec<String> {
    names.iter().map(|&name| name.to_owned()).collect()
}

#[fixture]
fn two_layer_tree() -> ConfigTree {
    ConfigTree::new(["inner", "outer"])
}

mod node {
    use super::*;

    #[rstest]
    fn resolves_to_highest_priority_layer() -> Result<()> {
        let mut node = ConfigNode::new("test_key", layers(&["first", "second", "third"]));
        node.set(Some("first"), "s1", json!("v1"))?;
        node.set(Some("third"), "s3", json!("v3"))?;
        node.set(Some("second"), "s2", json!("v2"))?;
        ensure!(node.get()? == &json!("v3"), "expected the third layer to win");
        Ok(())
    }

    #[rstest]
    fn set_without_layer_targets_outermost() -> Result<()> {
        let mut node = ConfigNode::new("test_key", layers(&["inner", "outer"]));
        node.set(Some("inner"), "s1", json!(1))?;
        node.set(None, "s2", json!(2))?;
        ensure!(node.get()? == &json!(2), "expected the outermost layer to win");
        ensure!(
            node.get_from_layer("outer")? == &json!(2),
            "expected the unqualified write to land on the outer layer"
        );
        Ok(())
    }

    #[rstest]
    fn rejects_unknown_layer() {
        let mut node = ConfigNode::new("test_key", layers(&["base"]));
        let error = node.set(Some("ghost"), "s1", json!(1));
        assert!(matches!(
            error,
            Err(MicrocosmError::UnknownLayer { ref layer, .. }) if layer == "ghost"
        ));
    }

    #[rstest]
    fn rejects_writes_once_frozen() {
        let mut node = ConfigNode::new("test_key", layers(&["base"]));
        node.freeze();
        let error = node.set(None, "s1", json!(1));
        assert!(matches!(&error, Err(MicrocosmError::Frozen { .. })));
        assert!(error.is_err_and(|e| e.kind() == ErrorKind::Config));
    }

    #[rstest]
    fn unset_node_read_names_the_key() {
        let node = ConfigNode::new("airspeed", layers(&["base"]));
        let error = node.get();
        assert!(matches!(
            error,
            Err(MicrocosmError::MissingValue { ref key }) if key == "airspeed"
        ));
    }

    #[rstest]
    fn provenance_is_ascending_and_complete() -> Result<()> {
        let mut node = ConfigNode::new("k", layers(&["a", "b", "c"]));
        node.set(Some("c"), "s3", json!(3))?;
        node.set(Some("a"), "s1", json!(1))?;
        let provenance = node.provenance();
        ensure!(provenance.len() == 2, "expected one entry per written layer");
        ensure!(provenance[0].layer == "a" && provenance[1].layer == "c");
        ensure!(provenance[0].source == "s1" && provenance[1].source == "s3");
        Ok(())
    }
}

mod tree {
    use super::*;

    #[rstest]
    fn layered_update_and_resolution(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"a": 1}), Some("inner"), "s1")?;
        two_layer_tree.update(json!({"a": 2}), Some("outer"), "s2")?;
        ensure!(two_layer_tree.get("a")? == &json!(2));
        let expected = vec![
            ProvenanceEntry {
                layer: "inner".into(),
                source: "s1".into(),
                value: json!(1),
            },
            ProvenanceEntry {
                layer: "outer".into(),
                source: "s2".into(),
                value: json!(2),
            },
        ];
        ensure!(two_layer_tree.provenance("a")? == expected);
        Ok(())
    }

    #[rstest]
    fn cascading_section_resolution() -> Result<()> {
        let mut config = ConfigTree::new(["inner_layer", "middle_layer", "outer_layer"]);
        config.update(
            json!({
                "section_a": {"item1": "value1", "item2": "value2"},
                "section_b": {"item1": "value3"},
            }),
            Some("inner_layer"),
            "base file",
        )?;
        config.update(
            json!({"section_a": {"item1": "value4"}, "section_b": {"item1": "value5"}}),
            Some("middle_layer"),
            "model file",
        )?;
        config.update(
            json!({"section_b": {"item1": "value6"}}),
            Some("outer_layer"),
            "overrides",
        )?;
        ensure!(config.subtree("section_a")?.get("item1")? == &json!("value4"));
        ensure!(config.subtree("section_a")?.get("item2")? == &json!("value2"));
        ensure!(config.subtree("section_b")?.get("item1")? == &json!("value6"));
        Ok(())
    }

    #[rstest]
    fn disjoint_deep_merges_union(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"a": {"x": 1}}), Some("inner"), "s1")?;
        two_layer_tree.update(json!({"a": {"y": 2}, "b": 3}), Some("inner"), "s2")?;
        ensure!(two_layer_tree.subtree("a")?.get("x")? == &json!(1));
        ensure!(two_layer_tree.subtree("a")?.get("y")? == &json!(2));
        ensure!(two_layer_tree.get("b")? == &json!(3));
        Ok(())
    }

    #[rstest]
    fn same_layer_overlap_overwrites(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"a": {"x": 1}}), Some("inner"), "s1")?;
        two_layer_tree.update(json!({"a": {"x": 9}}), Some("inner"), "s2")?;
        ensure!(two_layer_tree.get("b").is_err(), "b was never merged");
        ensure!(two_layer_tree.subtree("a")?.get("x")? == &json!(9));
        let provenance = two_layer_tree.subtree("a")?.provenance("x")?;
        ensure!(provenance.len() == 1, "overwrite replaces the layer entry");
        ensure!(provenance[0].source == "s2");
        Ok(())
    }

    #[rstest]
    #[case(json!({"a": {"x": 1}}), json!({"a": 2}))]
    #[case(json!({"a": 2}), json!({"a": {"x": 1}}))]
    fn shape_disagreement_fails(
        mut two_layer_tree: ConfigTree,
        #[case] first: Value,
        #[case] second: Value,
    ) -> Result<()> {
        two_layer_tree.update(first, Some("inner"), "s1")?;
        let error = two_layer_tree.update(second, Some("inner"), "s2");
        ensure!(
            matches!(error, Err(MicrocosmError::StructuralConflict { ref key, .. }) if key == "a"),
            "expected a structural conflict naming 'a'"
        );
        Ok(())
    }

    #[rstest]
    fn structural_conflict_names_both_shapes_and_sources(
        mut two_layer_tree: ConfigTree,
    ) -> Result<()> {
        two_layer_tree.update(json!({"a": 2}), Some("inner"), "model file")?;
        let Err(error) = two_layer_tree.update(json!({"a": {"x": 1}}), Some("inner"), "override")
        else {
            anyhow::bail!("expected the mismatched update to fail");
        };
        let message = error.to_string();
        ensure!(message.contains('a'), "message should name the key");
        ensure!(message.contains("model file") && message.contains("override"));
        ensure!(message.contains("value") && message.contains("nested section"));
        Ok(())
    }

    #[rstest]
    fn assignment_requires_a_merged_key(mut two_layer_tree: ConfigTree) -> Result<()> {
        let error = two_layer_tree.set("brand_new", json!(1));
        ensure!(
            matches!(error, Err(MicrocosmError::MissingKey { ref key }) if key == "brand_new"),
            "merge is the only key-introducing operation"
        );
        two_layer_tree.update(json!({"brand_new": 1}), Some("inner"), "s1")?;
        two_layer_tree.set("brand_new", json!(7))?;
        ensure!(two_layer_tree.get("brand_new")? == &json!(7));
        Ok(())
    }

    #[rstest]
    fn assignment_reaches_nested_leaves(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"a": {"x": 1}}), Some("inner"), "s1")?;
        two_layer_tree.subtree_mut("a")?.set("x", json!(5))?;
        ensure!(two_layer_tree.subtree("a")?.get("x")? == &json!(5));
        ensure!(matches!(
            two_layer_tree.subtree_mut("missing"),
            Err(MicrocosmError::MissingValue { ref key }) if key == "missing"
        ));
        ensure!(matches!(
            two_layer_tree.subtree_mut("a")?.subtree_mut("x"),
            Err(MicrocosmError::NotASubtree { .. })
        ));
        Ok(())
    }

    #[rstest]
    fn probing_never_materialises_keys(two_layer_tree: ConfigTree) {
        assert!(!two_layer_tree.contains("missing"));
        assert!(two_layer_tree.child("missing").is_none());
        assert!(matches!(
            two_layer_tree.get("missing"),
            Err(MicrocosmError::MissingValue { ref key }) if key == "missing"
        ));
        assert!(two_layer_tree.is_empty());
        assert_eq!(two_layer_tree.len(), 0);
    }

    #[rstest]
    fn provenance_of_unwritten_key_is_a_key_error(two_layer_tree: ConfigTree) {
        let error = two_layer_tree.provenance("missing_key");
        assert!(matches!(
            &error,
            Err(MicrocosmError::MissingValue { key }) if key == "missing_key"
        ));
        assert!(error.is_err_and(|e| e.kind() == ErrorKind::Key));
    }

    #[rstest]
    fn layer_pinned_reads(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"a": 1}), Some("inner"), "s1")?;
        two_layer_tree.update(json!({"a": 2}), Some("outer"), "s2")?;
        ensure!(two_layer_tree.get_from_layer("a", "inner")? == &json!(1));
        ensure!(two_layer_tree.get_from_layer("a", "outer")? == &json!(2));
        ensure!(matches!(
            two_layer_tree.get_from_layer("a", "ghost"),
            Err(MicrocosmError::UnknownLayer { .. })
        ));
        Ok(())
    }

    #[rstest]
    fn update_defaults_to_outermost_layer(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"a": 1}), Some("inner"), "s1")?;
        two_layer_tree.update(json!({"a": 5}), None, "s2")?;
        ensure!(two_layer_tree.get_from_layer("a", "outer")? == &json!(5));
        Ok(())
    }

    #[rstest]
    fn unknown_layer_propagates_from_leaves(mut two_layer_tree: ConfigTree) {
        let error = two_layer_tree.update(json!({"a": 1}), Some("ghost"), "s1");
        assert!(matches!(error, Err(MicrocosmError::UnknownLayer { .. })));
    }

    #[rstest]
    fn null_payload_is_an_empty_contribution(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(Value::Null, None, "s1")?;
        ensure!(two_layer_tree.is_empty());
        Ok(())
    }

    #[rstest]
    #[case(json!(3))]
    #[case(json!("scalar"))]
    #[case(json!([1, 2]))]
    fn non_map_payload_is_rejected(mut two_layer_tree: ConfigTree, #[case] payload: Value) {
        let error = two_layer_tree.update(payload, None, "s1");
        assert!(error.is_err_and(|e| {
            matches!(e, MicrocosmError::InvalidUpdate { .. }) && e.kind() == ErrorKind::Config
        }));
    }

    #[rstest]
    fn falsy_values_are_real_values(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"count": 0, "label": ""}), Some("inner"), "s1")?;
        ensure!(two_layer_tree.get("count")? == &json!(0));
        ensure!(two_layer_tree.get("label")? == &json!(""));
        ensure!(two_layer_tree.get("absent").is_err());
        Ok(())
    }

    #[rstest]
    fn freeze_is_recursive_and_one_way(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"a": {"x": 1}}), Some("inner"), "s1")?;
        two_layer_tree.freeze();
        ensure!(two_layer_tree.is_frozen());
        let Some(ConfigChild::Tree(subtree)) = two_layer_tree.child("a") else {
            anyhow::bail!("expected 'a' to be a subtree");
        };
        ensure!(subtree.is_frozen(), "freezing recurses into subtrees");
        let error = two_layer_tree.update(json!({"b": 2}), Some("inner"), "s2");
        ensure!(matches!(error, Err(MicrocosmError::Frozen { .. })));
        let error = two_layer_tree.set("a", json!({"x": 2}));
        ensure!(error.is_err(), "assignment must fail after freezing");
        Ok(())
    }

    #[rstest]
    fn leaf_and_section_accessors_disagree_loudly(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"leaf": 1, "section": {"x": 2}}), None, "s1")?;
        ensure!(matches!(
            two_layer_tree.get("section"),
            Err(MicrocosmError::NotAValue { ref key }) if key == "section"
        ));
        ensure!(matches!(
            two_layer_tree.subtree("leaf"),
            Err(MicrocosmError::NotASubtree { ref key }) if key == "leaf"
        ));
        Ok(())
    }

    #[rstest]
    fn nested_paths_appear_in_errors() -> Result<()> {
        let mut config = ConfigTree::with_name("sim", ["base"]);
        config.update(json!({"a": {"b": {"c": 1}}}), None, "s1")?;
        let error = config.subtree("a")?.subtree("b")?.get("missing");
        ensure!(matches!(
            error,
            Err(MicrocosmError::MissingValue { ref key }) if key == "sim.a.b.missing"
        ));
        Ok(())
    }

    #[rstest]
    fn resolved_snapshot_reflects_the_cascade(mut two_layer_tree: ConfigTree) -> Result<()> {
        two_layer_tree.update(json!({"a": 1, "b": {"x": 1}}), Some("inner"), "s1")?;
        two_layer_tree.update(json!({"a": 2, "b": {"y": 3}}), Some("outer"), "s2")?;
        ensure!(two_layer_tree.resolved() == json!({"a": 2, "b": {"x": 1, "y": 3}}));
        Ok(())
    }

    #[rstest]
    fn empty_layer_list_falls_back_to_base() -> Result<()> {
        let mut config = ConfigTree::new(Vec::<String>::new());
        config.update(json!({"a": 1}), None, "s1")?;
        ensure!(config.layers() == ["base"]);
        ensure!(config.get_from_layer("a", "base")? == &json!(1));
        Ok(())
    }
}
