#![allow(missing_docs)]

//! Typed serde pipeline: derive -> tree -> wire format -> tree -> derive.

use std::collections::BTreeMap;

use chrono::{TimeZone as _, Utc};
use serde::{Deserialize, Serialize};

use proplist::{
	Date, Uid, Value, decode_binary, decode_xml, encode_binary_to_vec, encode_xml_to_string,
	from_value, to_value,
};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Library {
	name: String,
	version: u32,
	shuffle: bool,
	tracks: Vec<Track>,
	settings: BTreeMap<String, bool>,
	comment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Track {
	title: String,
	plays: u64,
	rating: f64,
	bookmark: Option<u64>,
}

fn sample_library() -> Library {
	let mut settings = BTreeMap::new();
	settings.insert("auto-sync".to_owned(), true);
	settings.insert("crossfade".to_owned(), false);
	Library {
		name: "Road Trip 世界".to_owned(),
		version: 7,
		shuffle: true,
		tracks: vec![
			Track {
				title: "Intro".to_owned(),
				plays: 42,
				rating: 4.5,
				bookmark: Some(90),
			},
			Track {
				title: "Outro <&>".to_owned(),
				plays: 0,
				rating: 0.25,
				bookmark: None,
			},
		],
		settings,
		comment: None,
	}
}

#[test]
fn typed_structs_survive_the_binary_format() {
	let library = sample_library();
	let tree = to_value(&library).expect("library maps to a tree");
	let bytes = encode_binary_to_vec(&tree).expect("tree encodes");
	let decoded = decode_binary(&bytes).expect("document decodes");
	let back: Library = from_value(&decoded).expect("tree maps back");
	assert_eq!(back, library);
}

#[test]
fn typed_structs_survive_the_xml_format() {
	let library = sample_library();
	let tree = to_value(&library).expect("library maps to a tree");
	let text = encode_xml_to_string(&tree).expect("tree writes");
	let decoded = decode_xml(&text).expect("document parses");
	let back: Library = from_value(&decoded).expect("tree maps back");
	assert_eq!(back, library);
}

#[test]
fn optional_fields_vanish_and_return() {
	let mut library = sample_library();
	let tree = to_value(&library).expect("library maps to a tree");
	let dict = tree.as_dictionary().expect("a dictionary");
	assert_eq!(dict.get("comment"), None);
	assert_eq!(
		dict.get("tracks").and_then(Value::as_array).map(|items| {
			items[1]
				.as_dictionary()
				.expect("track dictionary")
				.get("bookmark")
				.is_none()
		}),
		Some(true)
	);

	library.comment = Some("favorites".to_owned());
	let tree = to_value(&library).expect("library maps to a tree");
	let bytes = encode_binary_to_vec(&tree).expect("tree encodes");
	let decoded = decode_binary(&bytes).expect("document decodes");
	let back: Library = from_value(&decoded).expect("tree maps back");
	assert_eq!(back.comment.as_deref(), Some("favorites"));
}

#[test]
fn dates_and_uids_travel_typed() {
	#[derive(Serialize, Deserialize, Debug, PartialEq)]
	struct Archive {
		stamp: Date,
		target: Uid,
		fallback: Option<Uid>,
	}

	// Binary keeps the raw seconds, fraction included.
	let archive = Archive {
		stamp: Date::from_seconds(123.456),
		target: Uid(9),
		fallback: None,
	};
	let tree = to_value(&archive).expect("archive maps to a tree");
	let bytes = encode_binary_to_vec(&tree).expect("tree encodes");
	let back: Archive = from_value(&decode_binary(&bytes).expect("document decodes")).expect("maps back");
	assert_eq!(back, archive);

	// XML renders whole seconds, so stick to a calendar time.
	let noon = Utc
		.with_ymd_and_hms(2020, 5, 17, 12, 0, 0)
		.single()
		.expect("valid calendar date");
	let archive = Archive {
		stamp: Date::from_datetime(noon),
		target: Uid(u64::MAX),
		fallback: Some(Uid(3)),
	};
	let tree = to_value(&archive).expect("archive maps to a tree");
	let text = encode_xml_to_string(&tree).expect("tree writes");
	let back: Archive = from_value(&decode_xml(&text).expect("document parses")).expect("maps back");
	assert_eq!(back, archive);
}

#[test]
fn enums_travel_through_binary() {
	#[derive(Serialize, Deserialize, Debug, PartialEq)]
	enum Shape {
		Point,
		Circle(u32),
		Scale(u32, u32),
		Rect { w: u32, h: u32 },
	}

	let shapes = vec![
		Shape::Point,
		Shape::Circle(3),
		Shape::Scale(2, 3),
		Shape::Rect { w: 2, h: 5 },
	];
	let tree = to_value(&shapes).expect("shapes map to a tree");
	let bytes = encode_binary_to_vec(&tree).expect("tree encodes");
	let back: Vec<Shape> = from_value(&decode_binary(&bytes).expect("document decodes")).expect("maps back");
	assert_eq!(back, shapes);
}

#[test]
fn signed_integers_keep_their_sign_through_xml() {
	#[derive(Serialize, Deserialize, Debug, PartialEq)]
	struct Offsets {
		x: i64,
		y: i64,
	}

	let offsets = Offsets { x: -42, y: 17 };
	let tree = to_value(&offsets).expect("offsets map to a tree");
	let text = encode_xml_to_string(&tree).expect("tree writes");
	assert!(text.contains("<integer>-42</integer>"));
	let back: Offsets = from_value(&decode_xml(&text).expect("document parses")).expect("maps back");
	assert_eq!(back, offsets);
}

#[test]
fn embedded_value_fields_pass_through() {
	#[derive(Serialize, Deserialize, Debug, PartialEq)]
	struct Wrapper {
		name: String,
		payload: Value,
	}

	let mut payload = proplist::Dictionary::new();
	payload.insert("blob", Value::Data(vec![0, 1, 2, 0xff]));
	payload.insert("count", 12_u64);
	payload.insert("label", "inner");
	payload.insert("ratio", 2.5_f64);
	payload.insert("tags", Value::Array(vec![Value::from("a"), Value::from(true)]));
	let wrapper = Wrapper {
		name: "piggyback".to_owned(),
		payload: Value::Dictionary(payload),
	};

	let tree = to_value(&wrapper).expect("wrapper maps to a tree");
	let bytes = encode_binary_to_vec(&tree).expect("tree encodes");
	let back: Wrapper = from_value(&decode_binary(&bytes).expect("document decodes")).expect("maps back");
	assert_eq!(back, wrapper);
}
