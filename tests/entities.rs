use entity_marshal::*;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct UserIdentifiers {
    user_id: String,
    email: String,
}

marshal_struct!(UserIdentifiers { user_id, email });

/// An expirable token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct ValidationToken {
    validation_token: String,
    /// Seconds since the Unix epoch.
    created_at: i64,
    /// Time to live, in seconds.
    expires_in: i32,
}

marshal_struct!(ValidationToken {
    validation_token,
    created_at,
    expires_in,
} {
    const ENCODING: Encoding = Encoding::Json;
});

impl ValidationToken {
    fn is_expired(&self, now: i64) -> bool {
        self.created_at + i64::from(self.expires_in) < now
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct User {
    ids: UserIdentifiers,
    name: String,
    password: String,
    admin: bool,
    state: u8,
    created_at: i64,
    validated_at: Option<i64>,
    token: Option<ValidationToken>,
    attributes: Option<std::collections::BTreeMap<String, String>>,
}

marshal_struct!(User {
    ids,
    name,
    password,
    admin,
    state,
    created_at,
    validated_at,
    token,
    attributes,
});

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct OAuthClient {
    client_id: String,
    secret: String,
    redirect_uri: String,
    grants: Vec<u32>,
    rights: Vec<String>,
    official_labeled: bool,
    creator: UserIdentifiers,
}

marshal_struct!(OAuthClient {
    client_id,
    secret,
    redirect_uri,
    grants,
    rights,
    official_labeled,
    creator,
});

fn alice() -> User {
    User {
        ids: UserIdentifiers {
            user_id: "alice".to_string(),
            email: "alice@example.com".to_string(),
        },
        name: "Alice".to_string(),
        password: "hunter2".to_string(),
        admin: false,
        state: 1,
        created_at: 1_500_000_000,
        validated_at: None,
        token: Some(ValidationToken {
            validation_token: "abcdef".to_string(),
            created_at: 1_500_000_000,
            expires_in: 3600,
        }),
        attributes: None,
    }
}

fn client() -> OAuthClient {
    OAuthClient {
        client_id: "console".to_string(),
        secret: "s3cr3t".to_string(),
        redirect_uri: "https://console.example.com/oauth/callback".to_string(),
        grants: vec![1, 2],
        rights: vec!["RIGHT_USER_INFO".to_string()],
        official_labeled: true,
        creator: alice().ids,
    }
}

#[test]
fn validation_token_expiry() {
    let token = alice().token.unwrap();
    assert!(!token.is_expired(1_500_000_000));
    assert!(!token.is_expired(1_500_003_600));
    assert!(token.is_expired(1_500_003_601));
}

#[test]
fn user_map_round_trip() {
    let user = alice();
    let map = encode_map(&user).unwrap();
    assert_eq!(map["ids.user_id"], Value::from("alice"));
    assert_eq!(map["state"], Value::U8(1));
    assert_eq!(map["created_at"], Value::I64(1_500_000_000));
    assert_eq!(map["token.expires_in"], Value::I32(3600));
    assert!(!map.contains_key("validated_at"));
    assert!(!map.contains_key("attributes"));

    let mut back = User::default();
    decode_map(&map, &mut back).unwrap();
    assert_eq!(back, user);
}

#[test]
fn partial_update_leaves_other_fields() {
    let mut user = alice();
    let mut update = FlatMap::new();
    update.insert("name".to_string(), Value::from("Alice B."));
    update.insert("validated_at".to_string(), Value::I64(1_500_000_100));
    update.insert("token".to_string(), Value::Bin(vec![1, 0]));
    decode_map(&update, &mut user).unwrap();

    let expected = User {
        name: "Alice B.".to_string(),
        validated_at: Some(1_500_000_100),
        ..alice()
    };
    assert_eq!(user, expected);
}

#[test]
fn nested_view_of_stored_user() {
    let map = encode_map(&alice()).unwrap();
    let nested = unflatten(&map).unwrap();
    let nested = Value::Map(nested);
    assert_eq!(nested["ids"]["email"], Value::from("alice@example.com"));
    assert_eq!(nested["token"]["validation_token"], Value::from("abcdef"));

    if let Value::Map(nested) = nested {
        assert_eq!(flatten(&nested).unwrap(), map);
    } else {
        unreachable!();
    }
}

#[test]
fn unknown_path_names_segment() {
    let mut update = FlatMap::new();
    update.insert("ids.phone".to_string(), Value::from("555"));
    let mut user = alice();
    match decode_map(&update, &mut user) {
        Err(Error::FieldNotFound { field, .. }) => assert_eq!(field, "phone"),
        other => panic!("expected FieldNotFound, got {:?}", other),
    }
}

#[test]
fn rejected_update_leaves_user_unchanged() {
    let mut update = FlatMap::new();
    update.insert("name".to_string(), Value::from("Mallory"));
    update.insert("token.expires_in".to_string(), Value::I64(60));
    let mut user = alice();
    user.token = None;
    let before = user.clone();
    assert!(matches!(
        decode_map(&update, &mut user),
        Err(Error::KindMismatch { .. })
    ));
    assert_eq!(user, before);
}

#[test]
fn client_byte_map_round_trip() {
    let client = client();
    let bm = encode_byte_map(&client).unwrap();
    assert_eq!(bm["official_labeled"], vec![1, 1, 1]);
    assert_eq!(bm["grants"], vec![1, 1, 0, 0, 0, 1, 0, 0, 0, 2]);
    assert_eq!(bm["creator.user_id"], b"\x01\x01alice".to_vec());
    assert_eq!(bm["rights"][1], Encoding::MsgPack.into_u8());

    let mut back = OAuthClient::default();
    decode_byte_map(&bm, &mut back).unwrap();
    assert_eq!(back, client);
}

#[test]
fn token_stored_as_json_envelope() {
    let token = alice().token.unwrap();
    let buf = encode_envelope(&token).unwrap();
    assert_eq!(buf[0], DEFAULT_VERSION.0);
    assert_eq!(buf[1], Encoding::Json.into_u8());
    let text = std::str::from_utf8(&buf[2..]).unwrap();
    let json: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(json["expires_in"], 3600);

    let back: Option<ValidationToken> = decode_envelope(&buf).unwrap();
    assert_eq!(back, Some(token));
}

#[test]
fn random_users_round_trip() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let mut user = alice();
        user.admin = rng.gen();
        user.state = rng.gen();
        user.created_at = rng.gen();
        user.validated_at = if rng.gen() { Some(rng.gen()) } else { None };
        if rng.gen() {
            user.token = None;
        }
        if rng.gen() {
            let mut attrs = std::collections::BTreeMap::new();
            attrs.insert("team".to_string(), format!("t{}", rng.gen::<u16>()));
            user.attributes = Some(attrs);
        }

        let mut back = User::default();
        decode_map(&encode_map(&user).unwrap(), &mut back).unwrap();
        assert_eq!(back, user);

        let mut back = User::default();
        decode_byte_map(&encode_byte_map(&user).unwrap(), &mut back).unwrap();
        assert_eq!(back, user);
    }
}
