//! Known-answer tests for USM key derivation and authentication.
//!
//! - RFC 3414 A.3 and A.5: password-to-key and localization, MD5 / SHA-1
//! - RFC 2202 / RFC 4231: HMAC vectors, truncated per RFC 3414 and RFC 7860

use snmp_credcheck::format::{hex, unhex};
use snmp_credcheck::v3::{
    AuthProtocol, LocalizedKey, MasterKey, PrivKey, PrivProtocol, SaltCounter, UsmSecurityParams,
};
use snmp_credcheck::KeyExtension;

const RFC_ENGINE_ID: &str = "000000000000000000000002";

fn rfc_engine() -> Vec<u8> {
    unhex(RFC_ENGINE_ID).unwrap()
}

/// RFC 3414 A.3.1.
#[test]
fn md5_maplesyrup() {
    let key = LocalizedKey::from_password(AuthProtocol::Md5, b"maplesyrup", &rfc_engine());
    assert_eq!(hex(key.as_bytes()), "526f5eed9fcce26f8964c2930787d82b");
}

/// RFC 3414 A.3.2.
#[test]
fn sha1_maplesyrup() {
    let key = LocalizedKey::from_password(AuthProtocol::Sha1, b"maplesyrup", &rfc_engine());
    assert_eq!(hex(key.as_bytes()), "6695febc9288e36282235fc7151f128497b38f3f");
}

/// RFC 3414 A.5.1 new key.
#[test]
fn md5_newsyrup() {
    let key = LocalizedKey::from_password(AuthProtocol::Md5, b"newsyrup", &rfc_engine());
    assert_eq!(hex(key.as_bytes()), "87021d7bd9d101ba05ea6e3bf9d9bd4a");
}

/// RFC 3414 A.5.2 new key.
#[test]
fn sha1_newsyrup() {
    let key = LocalizedKey::from_password(AuthProtocol::Sha1, b"newsyrup", &rfc_engine());
    assert_eq!(hex(key.as_bytes()), "78e2dcce79d59403b58c1bbaa5bff46391f1cd25");
}

#[test]
fn master_key_is_engine_independent() {
    let master = MasterKey::from_password(AuthProtocol::Sha256, b"maplesyrup");
    let a = master.localize(b"engine-a");
    let b = master.localize(b"engine-b");
    assert_ne!(a.as_bytes(), b.as_bytes());
    assert_eq!(
        a.as_bytes(),
        LocalizedKey::from_password(AuthProtocol::Sha256, b"maplesyrup", b"engine-a").as_bytes()
    );
}

/// RFC 2202 / RFC 4231 test case 1: key 0x0b x 20, "Hi There".
#[test]
fn hmac_case1_truncations() {
    let cases = [
        (AuthProtocol::Sha1, "b617318655057264e28bc0b6"),
        (AuthProtocol::Sha224, "896fb1128abbdf196832107cd49df33f"),
        (
            AuthProtocol::Sha256,
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da7",
        ),
        (
            AuthProtocol::Sha384,
            "afd03944d84895626b0825f4ab46907f15f9dadbe4101ec682aa034c7cebc59c",
        ),
        (
            AuthProtocol::Sha512,
            "87aa7cdea5ef619d4ff0b4241a1d6cb02379f4e2ce4ec2787ad0b30545e17cdedaa833b7d6b8a702038b274eaea3f4e4",
        ),
    ];
    for (protocol, expected) in cases {
        let key = LocalizedKey::from_bytes(protocol, vec![0x0b; 20]);
        let mac = key.compute_hmac(b"Hi There");
        assert_eq!(mac.len(), protocol.mac_len(), "{protocol}");
        assert_eq!(hex(&mac), expected, "{protocol}");
    }
}

/// RFC 2202 test case 2 ("Jefe").
#[test]
fn hmac_case2() {
    let data = b"what do ya want for nothing?";
    let md5 = LocalizedKey::from_bytes(AuthProtocol::Md5, b"Jefe".to_vec());
    assert_eq!(hex(&md5.compute_hmac(data)), "750c783e6ab0b503eaa86e31");
    let sha1 = LocalizedKey::from_bytes(AuthProtocol::Sha1, b"Jefe".to_vec());
    assert_eq!(hex(&sha1.compute_hmac(data)), "effcdf6ae5eb2fa2d27416d5");
}

#[test]
fn verify_rejects_truncated_and_altered_macs() {
    let key = LocalizedKey::from_bytes(AuthProtocol::Sha1, vec![0x0b; 20]);
    let mac = unhex("b617318655057264e28bc0b6").unwrap();
    assert!(key.verify_hmac(b"Hi There", &mac));
    assert!(!key.verify_hmac(b"Hi There", &mac[..8]));
    let mut altered = mac.clone();
    altered[0] ^= 0x80;
    assert!(!key.verify_hmac(b"Hi There", &altered));
}

#[test]
fn privacy_key_material_per_protocol() {
    let engine = rfc_engine();
    for (auth, privacy) in [
        (AuthProtocol::Md5, PrivProtocol::Des),
        (AuthProtocol::Md5, PrivProtocol::TripleDes),
        (AuthProtocol::Sha1, PrivProtocol::Aes128),
        (AuthProtocol::Sha1, PrivProtocol::Aes192),
        (AuthProtocol::Sha1, PrivProtocol::Aes256),
        (AuthProtocol::Sha512, PrivProtocol::Aes256),
    ] {
        let key = PrivKey::from_password(
            auth,
            privacy,
            b"maplesyrup",
            &engine,
            privacy.default_key_extension(),
        )
        .unwrap_or_else(|e| panic!("{auth}/{privacy}: {e}"));
        assert_eq!(key.protocol(), privacy);

        let salt = SaltCounter::from_value(1);
        let plaintext = b"\x30\x0b\x04\x00\x04\x00\xa0\x05\x02\x01\x01\x30\x00";
        let (ciphertext, params) = key.encrypt(plaintext, 1, 257, &salt).unwrap();
        let opened = key
            .decrypt(&ciphertext, 1, 257, &params, "192.0.2.1:161".parse().unwrap())
            .unwrap();
        assert_eq!(&opened[..plaintext.len()], plaintext, "{auth}/{privacy}");
    }
}

#[test]
fn short_digest_needs_extension() {
    let engine = rfc_engine();
    let err = PrivKey::from_password(
        AuthProtocol::Md5,
        PrivProtocol::Aes256,
        b"maplesyrup",
        &engine,
        KeyExtension::None,
    )
    .unwrap_err();
    assert!(err.to_string().contains("key extension"), "{err}");

    let localized = LocalizedKey::from_password(AuthProtocol::Md5, b"maplesyrup", &engine);
    let blumenthal = localized.extended(32, KeyExtension::Blumenthal, &engine).unwrap();
    let reeder = localized.extended(32, KeyExtension::Reeder, &engine).unwrap();
    assert_eq!(blumenthal.len(), 32);
    assert_eq!(reeder.len(), 32);
    assert_eq!(blumenthal[..16], reeder[..16]);
    assert_ne!(blumenthal[16..], reeder[16..]);
}

/// RFC 3414 A.4 style USM parameters for user "bert".
#[test]
fn usm_parameters_encoding() {
    let engine_id = unhex("800000020109840301000000").unwrap();
    let params = UsmSecurityParams::new(engine_id.clone(), 1, 257, "bert")
        .with_auth_placeholder(12)
        .with_priv_params(unhex("0123456789abcdef").unwrap());
    let encoded = params.encode();
    assert_eq!(encoded[0], 0x30);

    let decoded = UsmSecurityParams::decode(encoded, "192.0.2.1:161".parse().unwrap()).unwrap();
    assert_eq!(&decoded.engine_id[..], &engine_id[..]);
    assert_eq!(decoded.engine_boots, 1);
    assert_eq!(decoded.engine_time, 257);
    assert_eq!(&decoded.username[..], b"bert");
    assert_eq!(decoded.auth_params.len(), 12);
    assert_eq!(decoded.priv_params.len(), 8);
}
