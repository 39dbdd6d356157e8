//! Tests for pattern normalization, matching and extraction

use arcstr::ArcStr;

use super::{
	Capture, CaptureMap, PatternError, TopicPattern, Topics, extract, matches,
	normalize, normalize_all, validate_publish_topic,
};

fn compile(pattern: &str) -> TopicPattern {
	TopicPattern::parse(pattern).expect("Pattern should be valid")
}

mod normalize_tests {
	use super::*;

	#[test]
	fn test_strips_capture_names() {
		assert_eq!(normalize("a/+name/#tail"), "a/+/#");
	}

	#[test]
	fn test_leaves_literals_alone() {
		assert_eq!(normalize("sensors/room-1/temp"), "sensors/room-1/temp");
	}

	#[test]
	fn test_only_leading_character_counts() {
		assert_eq!(normalize("a+b/c#d"), "a+b/c#d");
	}

	#[test]
	fn test_sequence_keeps_shape() {
		assert_eq!(normalize_all(&["+x", "#y"]), vec!["+", "#"]);
		assert_eq!(normalize_all::<&str>(&[]), Vec::<String>::new());
	}

	#[test]
	fn test_topics_normalized_keeps_shape() {
		let one = Topics::from("a/+id").normalized();
		assert_eq!(one, Topics::One(ArcStr::from("a/+")));

		let many = Topics::from(vec!["a/+id", "b", "#all"]).normalized();
		assert_eq!(many, Topics::from(vec!["a/+", "b", "#"]));
	}

	#[test]
	fn test_compiled_pattern_exposes_normalized_form() {
		let pattern = compile("devices/+device_id/#path");
		assert_eq!(pattern.normalized().as_str(), "devices/+/#");
		assert_eq!(pattern.as_str(), "devices/+device_id/#path");
	}
}

mod matches_tests {
	use super::*;

	#[test]
	fn test_single_level_wildcard() {
		assert!(matches("a/+/c", "a/b/c"));
		assert!(!matches("a/+/c", "a/b/b/c"));
		assert!(!matches("a/+/c", "a/c"));
	}

	#[test]
	fn test_multi_level_wildcard() {
		assert!(matches("a/#", "a/b/c"));
		assert!(matches("a/#", "a/b"));
		assert!(matches("#", "anything/at/all"));
	}

	#[test]
	fn test_multi_level_matches_zero_trailing_levels() {
		assert!(matches("a/#", "a"));
		assert!(matches("a/#rest", "a"));
		assert!(!matches("a/b/#", "a"));
	}

	#[test]
	fn test_non_final_hash_fails_instead_of_erroring() {
		assert!(!matches("a/#/c", "a/b/c"));
	}

	#[test]
	fn test_literal_is_case_sensitive() {
		assert!(matches("Sensors/temp", "Sensors/temp"));
		assert!(!matches("Sensors/temp", "sensors/temp"));
	}

	#[test]
	fn test_no_implicit_trailing_wildcard() {
		assert!(!matches("a/b", "a/b/c"));
		assert!(!matches("a/+", "a/b/c"));
	}

	#[test]
	fn test_single_level_needs_non_empty_level() {
		assert!(!matches("a/+", "a/"));
		assert!(!matches("+/b", "/b"));
	}

	#[test]
	fn test_capture_names_play_no_role() {
		assert_eq!(matches("a/+id/c", "a/b/c"), matches("a/+/c", "a/b/c"));
		assert_eq!(matches("a/#rest", "a/b/c"), matches("a/#", "a/b/c"));
	}

	#[test]
	fn test_compiled_matches() {
		let pattern = compile("home/+room/temperature");
		assert!(pattern.matches("home/kitchen/temperature"));
		assert!(!pattern.matches("home/kitchen/humidity"));
		assert!(!pattern.matches("home/kitchen"));
	}
}

mod extract_tests {
	use super::*;

	#[test]
	fn test_single_level_capture() {
		let captures = extract("a/+id/c", "a/123/c");
		assert_eq!(captures.len(), 1);
		assert_eq!(captures.single("id"), Some("123"));
	}

	#[test]
	fn test_multi_level_capture() {
		let captures = extract("a/#rest", "a/b/c");
		assert_eq!(captures.multi("rest"), Some(vec!["b", "c"]));
	}

	#[test]
	fn test_multi_level_capture_can_be_empty() {
		let captures = extract("a/#rest", "a");
		assert_eq!(captures.multi("rest"), Some(vec![]));
	}

	#[test]
	fn test_bare_wildcards_capture_nothing() {
		assert!(extract("a/+/#", "a/b/c/d").is_empty());
	}

	#[test]
	fn test_captures_keep_pattern_order() {
		let captures = extract("+site/+device/#path", "eu/dev-7/cpu/load");
		let names: Vec<&str> = captures.iter().map(|(name, _)| name).collect();
		assert_eq!(names, vec!["site", "device", "path"]);
		assert_eq!(captures.single("site"), Some("eu"));
		assert_eq!(captures.single("device"), Some("dev-7"));
		assert_eq!(captures.multi("path"), Some(vec!["cpu", "load"]));
	}

	#[test]
	fn test_repeated_name_keeps_last_value() {
		let captures = extract("+x/+x", "a/b");
		assert_eq!(captures.len(), 1);
		assert_eq!(captures.single("x"), Some("b"));
	}

	#[test]
	fn test_compiled_extract_agrees() {
		let pattern = compile("a/+id/#rest");
		let topic = ArcStr::from("a/9/x/y");
		assert_eq!(pattern.extract(&topic), extract("a/+id/#rest", "a/9/x/y"));
	}

	#[test]
	fn test_try_match() {
		let pattern = compile("users/+user/inbox");
		let topic = ArcStr::from("users/ada/inbox");
		let captures = pattern.try_match(&topic).unwrap();
		assert_eq!(captures.single("user"), Some("ada"));
		assert!(pattern.try_match(&ArcStr::from("users/ada")).is_none());
	}

	#[test]
	fn test_capture_accessors() {
		let captures = extract("a/+one/#many", "a/b/c/d");
		assert_eq!(captures.get("one"), Some(&Capture::Single("b".into())));
		assert_eq!(captures.get("many").unwrap().joined(), "c/d");
		assert_eq!(captures.single("many"), None);
		assert_eq!(captures.multi("one"), None);
		assert_eq!(captures.get("missing"), None);
	}
}

mod parse_tests {
	use super::*;

	#[test]
	fn test_empty_pattern_rejected() {
		assert_eq!(TopicPattern::parse(""), Err(PatternError::EmptyPattern));
	}

	#[test]
	fn test_hash_must_be_last() {
		assert_eq!(
			TopicPattern::parse("a/#rest/c"),
			Err(PatternError::hash_position("a/#rest/c"))
		);
	}

	#[test]
	fn test_duplicate_capture_rejected() {
		assert_eq!(
			TopicPattern::parse("+id/x/+id"),
			Err(PatternError::DuplicateCapture {
				name: "id".to_string()
			})
		);
	}

	#[test]
	fn test_embedded_wildcard_rejected() {
		assert!(matches!(
			TopicPattern::parse("sensors/temp#"),
			Err(PatternError::WildcardUsage { .. })
		));
	}

	#[test]
	fn test_introspection() {
		let pattern = compile("a/+x/#y");
		assert_eq!(pattern.len(), 3);
		assert!(pattern.has_multi_level());
		assert_eq!(pattern.capture_names().collect::<Vec<_>>(), vec!["x", "y"]);
		assert_eq!(pattern.to_string(), "a/+x/#y");
	}

	#[test]
	fn test_conversions() {
		let parsed: TopicPattern = "a/+b".parse().unwrap();
		assert_eq!(parsed, TopicPattern::try_from("a/+b").unwrap());
		assert_eq!(parsed, TopicPattern::try_from(String::from("a/+b")).unwrap());
	}
}

mod render_tests {
	use super::*;

	#[test]
	fn test_render_substitutes_captures() {
		let pattern = compile("devices/+id/#path");
		let topic = ArcStr::from("devices/42/cpu/0");
		let captures = pattern.extract(&topic);
		assert_eq!(pattern.render(&captures).unwrap(), "devices/42/cpu/0");
	}

	#[test]
	fn test_render_empty_multi_level() {
		let pattern = compile("devices/#path");
		let topic = ArcStr::from("devices");
		let captures = pattern.extract(&topic);
		assert_eq!(pattern.render(&captures).unwrap(), "devices");
	}

	#[test]
	fn test_render_requires_named_wildcards() {
		let pattern = compile("devices/+/status");
		assert_eq!(
			pattern.render(&CaptureMap::new()),
			Err(PatternError::MissingCapture {
				name: "+".to_string()
			})
		);
	}
}

mod publish_topic_tests {
	use super::*;

	#[test]
	fn test_valid_topic() {
		assert!(validate_publish_topic("sensors/room-1/temp").is_ok());
	}

	#[test]
	fn test_rejects_empty_and_wildcards() {
		assert!(validate_publish_topic("").is_err());
		assert!(validate_publish_topic("a/+/c").is_err());
		assert!(validate_publish_topic("a/#").is_err());
		assert!(validate_publish_topic("a\0b").is_err());
	}

	#[test]
	fn test_rejects_oversized_topic() {
		let topic = "x".repeat(super::super::limits::MAX_TOPIC_LENGTH + 1);
		assert!(matches!(
			validate_publish_topic(&topic),
			Err(PatternError::InvalidTopic { .. })
		));
	}
}

mod properties {
	use proptest::prelude::*;

	use super::*;

	fn arb_level() -> impl Strategy<Value = String> {
		"[a-z0-9]{1,6}"
	}

	fn arb_literal_path() -> impl Strategy<Value = String> {
		prop::collection::vec(arb_level(), 1 .. 6).prop_map(|l| l.join("/"))
	}

	/// Pattern as written with unique capture names; `#` only in last place.
	fn arb_pattern() -> impl Strategy<Value = String> {
		let segment = prop_oneof![
			3 => arb_level().prop_map(Some),
			1 => Just(None::<String>),
		];
		(prop::collection::vec((segment, any::<bool>()), 1 .. 5), 0u8 .. 4)
			.prop_map(|(segments, tail)| {
				let mut written: Vec<String> = segments
					.into_iter()
					.enumerate()
					.map(|(i, (literal, named))| match literal {
						| Some(literal) => literal,
						| None if named => format!("+n{i}"),
						| None => "+".to_string(),
					})
					.collect();
				match tail {
					| 2 => written.push("#".to_string()),
					| 3 => written.push("#tail".to_string()),
					| _ => {}
				}
				written.join("/")
			})
	}

	/// Named-only pattern with unique names and a topic that matches it.
	fn arb_named_match() -> impl Strategy<Value = (String, String)> {
		let segment = prop_oneof![
			arb_level().prop_map(|l| (l.clone(), vec![l], false)),
			arb_level().prop_map(|l| (String::from("+"), vec![l], true)),
		];
		let tail = prop::option::of(prop::collection::vec(arb_level(), 0 .. 3));
		(prop::collection::vec(segment, 1 .. 5), tail).prop_map(
			|(segments, tail)| {
				let mut pattern = Vec::new();
				let mut topic = Vec::new();
				for (i, (written, levels, named)) in segments.into_iter().enumerate()
				{
					pattern.push(if named {
						format!("{written}p{i}")
					} else {
						written
					});
					topic.extend(levels);
				}
				if let Some(rest) = tail {
					pattern.push("#rest".to_string());
					topic.extend(rest);
				}
				(pattern.join("/"), topic.join("/"))
			},
		)
	}

	proptest! {
		#[test]
		fn literal_match_is_equality(p in arb_literal_path(), t in arb_literal_path()) {
			prop_assert_eq!(matches(&p, &t), p == t);
			prop_assert!(matches(&p, &p));
		}

		#[test]
		fn normalize_is_idempotent(p in arb_pattern()) {
			let once = normalize(&p);
			prop_assert_eq!(normalize(&once), once);
		}

		#[test]
		fn compiled_agrees_with_reference(p in arb_pattern(), t in arb_literal_path()) {
			let compiled = compile(&p);
			prop_assert_eq!(compiled.matches(&t), matches(&p, &t));
			if compiled.matches(&t) {
				prop_assert_eq!(compiled.extract(&ArcStr::from(t.as_str())), extract(&p, &t));
			}
		}

		#[test]
		fn extract_round_trips((p, t) in arb_named_match()) {
			prop_assert!(matches(&p, &t), "{} should match {}", p, t);
			let compiled = compile(&p);
			let captures = compiled.extract(&ArcStr::from(t.as_str()));
			prop_assert_eq!(compiled.render(&captures).unwrap(), t);
		}
	}
}
