use der::asn1::{Null, ObjectIdentifier, OctetStringRef};
use der::{Encode, Sequence};

/// id-sha256
const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");

#[derive(Sequence)]
struct AlgorithmIdentifier {
    oid: ObjectIdentifier,
    parameters: Null,
}

#[derive(Sequence)]
struct DigestInfo<'a> {
    algorithm: AlgorithmIdentifier,
    digest: OctetStringRef<'a>,
}

/// Hashes the message with SHA-256, then wraps the hash into a DER-encoded DigestInfo
/// for the card to sign with PKCS#1 v1.5.
pub fn calculate(message: &[u8]) -> der::Result<Vec<u8>> {
    let digest = ring::digest::digest(&ring::digest::SHA256, message);

    DigestInfo {
        algorithm: AlgorithmIdentifier {
            oid: SHA256,
            parameters: Null,
        },
        digest: OctetStringRef::new(digest.as_ref())?,
    }
    .to_der()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate() {
        /*
           SEQUENCE
             SEQUENCE
               ObjectIdentifier sha256 (2 16 840 1 101 3 4 2 1)
               NULL
             OCTETSTRING 185f8db32271fe25f561a6fc938b2e264306ec304eda518007d1764826381969
        */
        let mut expected = vec![
            0x30, 0x31, 0x30, 0x0D, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x01, 0x05, 0x00, 0x04, 0x20,
        ];
        expected.extend(
            hex::decode("185f8db32271fe25f561a6fc938b2e264306ec304eda518007d1764826381969")
                .unwrap(),
        );

        assert_eq!(expected, calculate(b"Hello").unwrap());
    }
}
