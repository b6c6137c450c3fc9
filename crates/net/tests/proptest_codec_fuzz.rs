//! Fuzz-style property tests for the frame codec.
//!
//! These tests validate that the decoder handles arbitrary network input
//! gracefully and that every message variant survives a frame round trip.

use proptest::prelude::*;
use tradewind_core::{
    ChangeRecord, Element, ElementCodec, GameOption, Goods, HighScore, ObjectId, OptionGroup,
};
use tradewind_net::{
    decode_element, decode_message, encode_message, message_type_tag, CodecError, ErrorKind,
    ErrorMessage, HighScoresMessage, LootCargoMessage, Message, ScoutSpeakToChiefMessage,
    UpdateMapGeneratorOptionsMessage, UpdateMessage,
};
use tradewind_world::{Settlement, SpeakResult, Tile, Unit};

fn object_id() -> impl Strategy<Value = ObjectId> {
    ("[a-z]{1,8}", 0u32..10_000).prop_map(|(prefix, serial)| {
        ObjectId::with_serial(&prefix, u64::from(serial)).unwrap()
    })
}

fn goods() -> impl Strategy<Value = Goods> {
    ("model\\.goods\\.[a-z]{1,10}", 1u32..1000).prop_map(|(kind, amount)| Goods::new(kind, amount))
}

fn speak_result() -> impl Strategy<Value = Option<SpeakResult>> {
    prop_oneof![
        Just(None),
        Just(Some(SpeakResult::Tales)),
        Just(Some(SpeakResult::Beads)),
        Just(Some(SpeakResult::Nothing)),
        Just(Some(SpeakResult::Die)),
    ]
}

fn message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (object_id(), object_id(), prop::collection::vec(goods(), 0..8)).prop_map(
            |(winner, loser, goods)| {
                let unit =
                    Unit::new(winner, loser.clone(), "model.unit.privateer", Tile::new(0, 0));
                Message::LootCargo(LootCargoMessage::new(&unit, loser, goods))
            }
        ),
        (object_id(), object_id(), speak_result()).prop_map(|(unit, settlement, result)| {
            let owner = unit.clone();
            let scout = Unit::new(unit, owner.clone(), "model.unit.seasonedScout", Tile::new(1, 1));
            let camp = Settlement::new(settlement, "Camp", owner, Tile::new(2, 2), true);
            Message::ScoutSpeakToChief(ScoutSpeakToChiefMessage::new(&scout, &camp, result))
        }),
        (0i64..100, any::<bool>(), "[ -~]{0,20}").prop_map(|(land, import, kind)| {
            let group = OptionGroup::new("model.option.mapGeneratorOptions")
                .with_option(GameOption::integer("model.option.landMass", land, 0, 100))
                .with_option(GameOption::boolean("model.option.importTerrain", import))
                .with_option(GameOption::text("model.option.mapGeneratorType", kind));
            Message::UpdateMapGeneratorOptions(UpdateMapGeneratorOptionsMessage::new(&group))
        }),
        prop::collection::vec(("[A-Za-z ]{0,12}", -500i64..20_000), 0..5).prop_map(|rows| {
            let scores: Vec<_> = rows
                .into_iter()
                .map(|(name, score)| HighScore::new(name, score))
                .collect();
            Message::HighScores(HighScoresMessage::reply(&scores))
        }),
        (object_id(), "[a-zA-Z]{1,10}", "[ -~]{0,16}").prop_map(|(target, name, value)| {
            Message::Update(UpdateMessage::new(vec![
                ChangeRecord::update(target.clone(), &name, value),
                ChangeRecord::remove(target),
            ]))
        }),
        "[ -~]{0,64}"
            .prop_map(|reason| Message::Error(ErrorMessage::new(ErrorKind::Rules, reason))),
    ]
}

/// Twenty thousand single-child levels fit in one frame.
#[test]
fn deeply_nested_payload_is_a_payload_error() {
    let mut payload = [0u8, 0, 1].repeat(20_000);
    payload.extend_from_slice(&[0, 0, 0]);
    let mut frame = ((payload.len() + 1) as u32).to_le_bytes().to_vec();
    frame.push(message_type_tag("update").unwrap());
    frame.extend_from_slice(&payload);

    assert!(matches!(decode_element(&frame), Err(CodecError::Payload(_))));
    assert!(matches!(decode_message(&frame), Err(CodecError::Payload(_))));
}

proptest! {
    /// Property: Arbitrary bytes don't crash the decoder
    #[test]
    fn arbitrary_bytes_dont_crash_decoder(
        random_bytes in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let _result = decode_message(&random_bytes);
        // No panic = success
    }

    /// Property: Arbitrary payloads behind a valid header don't crash the decoder
    #[test]
    fn arbitrary_payload_with_valid_header(
        header in 0u8..8,
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut frame = ((payload.len() + 1) as u32).to_le_bytes().to_vec();
        frame.push(header);
        frame.extend_from_slice(&payload);
        let _result = decode_message(&frame);
    }

    /// Property: Every variant survives a frame round trip
    #[test]
    fn messages_roundtrip(msg in message()) {
        let encoded = encode_message(&msg).unwrap();
        let decoded = decode_message(&encoded).unwrap();
        prop_assert_eq!(&msg, &decoded);

        let (_, element) = decode_element(&encoded).unwrap();
        prop_assert_eq!(element, msg.to_element());
    }

    /// Property: Encoding is deterministic
    #[test]
    fn encoding_is_deterministic(msg in message()) {
        prop_assert_eq!(encode_message(&msg).unwrap(), encode_message(&msg.clone()).unwrap());
    }

    /// Property: High score records decode with defaults for any subset of attributes
    #[test]
    fn high_score_tolerates_missing_attributes(mask in any::<u16>(), score in 0i64..20_000) {
        let full = HighScore::new("Minuit", score).to_element();
        let mut partial = Element::new(HighScore::TAG);
        for (index, (name, value)) in full.attributes().iter().enumerate() {
            if mask & (1 << index) != 0 {
                partial.set_attr(name, value);
            }
        }
        prop_assert!(HighScore::from_element(&partial).is_ok());
    }
}
