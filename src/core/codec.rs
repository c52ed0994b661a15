//! Encoding of a single parameter into its place in a node's `<parameters>`
//! subtree.
//!
//! A parameter name may carry a `>`-delimited nesting path; a leading `!` on
//! a segment forces a fresh wrapper element even when one with that tag
//! already exists (used for repeatable structural wrappers). Unset values are
//! skipped entirely so the operator default applies.
use crate::core::params::{Parameter, ParameterKind, ParameterValue};
use crate::io::xml::Element;

/// One step of the nesting path above the leaf element.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub name: String,
    /// Always create a new element instead of descending into the last
    /// existing one (the `!` marker).
    pub fresh: bool,
}

/// A parameter resolved to its target location and text form.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedParameter {
    pub path: Vec<PathSegment>,
    pub leaf: String,
    pub text: String,
}

/// Encodes a parameter, or `None` when it must be skipped (unset value,
/// malformed extent, unknown selection index).
pub fn encode(param: &Parameter) -> Option<EncodedParameter> {
    let value = param.value.as_ref()?;
    if value.is_unset() {
        return None;
    }
    let text = format_value(&param.spec.kind, value, &param.spec.options)?;
    let (path, leaf) = split_name(&param.spec.name);
    Some(EncodedParameter { path, leaf, text })
}

fn format_value(kind: &ParameterKind, value: &ParameterValue, options: &[String]) -> Option<String> {
    match kind {
        ParameterKind::Boolean => {
            let truthy = match value {
                ParameterValue::Bool(b) => *b,
                ParameterValue::Int(v) => *v != 0,
                ParameterValue::Float(v) => *v != 0.0,
                ParameterValue::Text(s) => s.eq_ignore_ascii_case("true"),
            };
            // the GPF schema wants capitalized literals
            Some(if truthy { "True" } else { "False" }.to_string())
        }
        ParameterKind::Selection => {
            let idx = value.as_index()?;
            options.get(idx).cloned()
        }
        ParameterKind::Extent => extent_to_wkt(&value.as_text()),
        ParameterKind::Raster
        | ParameterKind::BandExpression
        | ParameterKind::Polarisations
        | ParameterKind::PixelSize
        | ParameterKind::Literal => Some(value.as_text()),
    }
}

/// Builds a closed WKT polygon from `xmin,xmax,ymin,ymax`, tracing the
/// corners (xmin,ymin) → (xmin,ymax) → (xmax,ymax) → (xmax,ymin) and closing
/// the ring. Anything other than exactly four components is skipped, not
/// raised.
fn extent_to_wkt(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_start_matches('(').trim_end_matches(')');
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return None;
    }
    let (xmin, xmax, ymin, ymax) = (parts[0], parts[1], parts[2], parts[3]);
    Some(format!(
        "POLYGON(({xmin} {ymin}, {xmin} {ymax}, {xmax} {ymax}, {xmax} {ymin}, {xmin} {ymin}))"
    ))
}

fn split_name(name: &str) -> (Vec<PathSegment>, String) {
    let mut tags: Vec<&str> = name.split('>').collect();
    // the final segment is the leaf element; the Subset operator historically
    // calls its geometry parameter geoRegionExtent while the schema tag is
    // geoRegion
    let leaf = match tags.pop() {
        Some("geoRegionExtent") => "geoRegion".to_string(),
        Some(tag) => tag.to_string(),
        None => name.to_string(),
    };
    let path = tags
        .into_iter()
        .map(|tag| match tag.strip_prefix('!') {
            Some(rest) => PathSegment {
                name: rest.to_string(),
                fresh: true,
            },
            None => PathSegment {
                name: tag.to_string(),
                fresh: false,
            },
        })
        .collect();
    (path, leaf)
}

/// Inserts an encoded parameter under `parameters`, creating wrapper
/// elements along the path as needed. At most one leaf element with a given
/// tag may exist directly under its parent; an existing one has its text
/// overwritten.
pub fn apply(parameters: &mut Element, encoded: &EncodedParameter) {
    let mut parent = parameters;
    for segment in &encoded.path {
        parent = descend(parent, segment);
    }
    match parent.find_mut(&encoded.leaf) {
        Some(leaf) => leaf.text = Some(encoded.text.clone()),
        None => {
            parent.push_child(Element::with_text(&encoded.leaf, &encoded.text));
        }
    }
}

fn descend<'a>(parent: &'a mut Element, segment: &PathSegment) -> &'a mut Element {
    if !segment.fresh {
        // descend into the last existing element with this tag, if any
        if let Some(idx) = parent.children.iter().rposition(|c| c.tag == segment.name) {
            return &mut parent.children[idx];
        }
    }
    parent.push_child(Element::new(&segment.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::{NO_VALUE_FLOAT, NO_VALUE_INT, ParameterSpec};

    fn param(name: &str, kind: ParameterKind, value: ParameterValue) -> Parameter {
        Parameter::with_value(ParameterSpec::new(name, name, kind), value)
    }

    #[test]
    fn unset_sentinels_skip_for_every_kind() {
        let kinds = [
            ParameterKind::Raster,
            ParameterKind::Boolean,
            ParameterKind::Selection,
            ParameterKind::Extent,
            ParameterKind::BandExpression,
            ParameterKind::Polarisations,
            ParameterKind::PixelSize,
            ParameterKind::Literal,
        ];
        for kind in kinds {
            assert!(encode(&param("p", kind, ParameterValue::Int(NO_VALUE_INT))).is_none());
            assert!(encode(&param("p", kind, ParameterValue::Float(NO_VALUE_FLOAT))).is_none());
            assert!(encode(&param("p", kind, ParameterValue::Text(String::new()))).is_none());
            assert!(encode(&Parameter::new(ParameterSpec::new("p", "p", kind))).is_none());
        }
    }

    #[test]
    fn textual_sentinels_skip_too() {
        // description-file defaults and CLI bindings carry the sentinels as text
        let p = param(
            "externalAuxFile",
            ParameterKind::Literal,
            ParameterValue::Text("99999".into()),
        );
        assert!(encode(&p).is_none());
        let p = param(
            "offset",
            ParameterKind::Literal,
            ParameterValue::Text("99999.9".into()),
        );
        assert!(encode(&p).is_none());
    }

    #[test]
    fn booleans_are_capitalized() {
        let enc = encode(&param("flag", ParameterKind::Boolean, ParameterValue::Bool(true)));
        assert_eq!(enc.unwrap().text, "True");
        let enc = encode(&param("flag", ParameterKind::Boolean, ParameterValue::Bool(false)));
        assert_eq!(enc.unwrap().text, "False");
    }

    #[test]
    fn selection_resolves_index_to_label() {
        let mut spec = ParameterSpec::new("method", "method", ParameterKind::Selection);
        spec.options = vec!["A".into(), "B".into(), "C".into()];
        let p = Parameter::with_value(spec, ParameterValue::Text("1".into()));
        assert_eq!(encode(&p).unwrap().text, "B");
    }

    #[test]
    fn selection_out_of_range_skips() {
        let mut spec = ParameterSpec::new("method", "method", ParameterKind::Selection);
        spec.options = vec!["A".into()];
        let p = Parameter::with_value(spec, ParameterValue::Int(7));
        assert!(encode(&p).is_none());
    }

    #[test]
    fn extent_becomes_closed_wkt_ring() {
        let enc = encode(&param(
            "geoRegion",
            ParameterKind::Extent,
            ParameterValue::Text("0,10,0,5".into()),
        ));
        assert_eq!(
            enc.unwrap().text,
            "POLYGON((0 0, 0 5, 10 5, 10 0, 0 0))"
        );
    }

    #[test]
    fn malformed_extent_skips() {
        for raw in ["0,10,0", "0,10,0,5,7", "nonsense"] {
            let p = param("geoRegion", ParameterKind::Extent, ParameterValue::Text(raw.into()));
            assert!(encode(&p).is_none(), "{raw} should be skipped");
        }
    }

    #[test]
    fn geo_region_extent_leaf_is_renamed() {
        let enc = encode(&param(
            "geoRegionExtent",
            ParameterKind::Extent,
            ParameterValue::Text("1,2,3,4".into()),
        ))
        .unwrap();
        assert_eq!(enc.leaf, "geoRegion");
    }

    #[test]
    fn nested_path_descends_and_creates() {
        let enc = encode(&param(
            "targetBands>!targetBand>name",
            ParameterKind::Literal,
            ParameterValue::Text("Sigma0_VV".into()),
        ))
        .unwrap();
        let mut parameters = Element::new("parameters");
        apply(&mut parameters, &enc);
        apply(&mut parameters, &enc);
        // `!` forces a second targetBand wrapper under the shared targetBands
        let bands = parameters.find("targetBands").unwrap();
        assert_eq!(parameters.find_all("targetBands").count(), 1);
        assert_eq!(bands.find_all("targetBand").count(), 2);
    }

    #[test]
    fn plain_path_reuses_last_existing_element() {
        let name_enc = encode(&param(
            "targetBands>targetBand>name",
            ParameterKind::Literal,
            ParameterValue::Text("b1".into()),
        ))
        .unwrap();
        let expr_enc = encode(&param(
            "targetBands>targetBand>expression",
            ParameterKind::Literal,
            ParameterValue::Text("VV+VH".into()),
        ))
        .unwrap();
        let mut parameters = Element::new("parameters");
        apply(&mut parameters, &name_enc);
        apply(&mut parameters, &expr_enc);
        let band = parameters.find("targetBands").unwrap().find("targetBand").unwrap();
        assert_eq!(band.children.len(), 2);
        assert_eq!(band.find("name").unwrap().text_or_empty(), "b1");
        assert_eq!(band.find("expression").unwrap().text_or_empty(), "VV+VH");
    }

    #[test]
    fn existing_leaf_text_is_overwritten_not_duplicated() {
        let first = encode(&param("window", ParameterKind::Literal, ParameterValue::Int(3))).unwrap();
        let second = encode(&param("window", ParameterKind::Literal, ParameterValue::Int(5))).unwrap();
        let mut parameters = Element::new("parameters");
        apply(&mut parameters, &first);
        apply(&mut parameters, &second);
        assert_eq!(parameters.find_all("window").count(), 1);
        assert_eq!(parameters.find("window").unwrap().text_or_empty(), "5");
    }
}
