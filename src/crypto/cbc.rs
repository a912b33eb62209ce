//! CBC + HMAC, encrypt-then-MAC (spec §4.E).

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;

use super::{BlockCipher, DigestAlgorithm};
use crate::error::{Error, Result};
use crate::securebuffer::SecureBuffer;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type BlowfishCbcEnc = cbc::Encryptor<blowfish::Blowfish>;
type BlowfishCbcDec = cbc::Decryptor<blowfish::Blowfish>;

fn cbc_encrypt(cipher: BlockCipher, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    match cipher {
        BlockCipher::Aes128 => {
            let enc = Aes128CbcEnc::new_from_slices(key, iv).map_err(|_| Error::CryptoAlgorithm)?;
            Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
        }
        BlockCipher::Aes256 => {
            let enc = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| Error::CryptoAlgorithm)?;
            Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
        }
        BlockCipher::Blowfish => {
            let enc = BlowfishCbcEnc::new_from_slices(key, iv).map_err(|_| Error::CryptoAlgorithm)?;
            Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
        }
    }
}

fn cbc_decrypt(cipher: BlockCipher, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    match cipher {
        BlockCipher::Aes128 => {
            let dec = Aes128CbcDec::new_from_slices(key, iv).map_err(|_| Error::CryptoAlgorithm)?;
            dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext).map_err(|_| Error::CryptoEncryption)
        }
        BlockCipher::Aes256 => {
            let dec = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| Error::CryptoAlgorithm)?;
            dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext).map_err(|_| Error::CryptoEncryption)
        }
        BlockCipher::Blowfish => {
            let dec = BlowfishCbcDec::new_from_slices(key, iv).map_err(|_| Error::CryptoAlgorithm)?;
            dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext).map_err(|_| Error::CryptoEncryption)
        }
    }
}

fn hmac_tag(digest: DigestAlgorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    Ok(match digest {
        DigestAlgorithm::Sha1 => {
            let mut m = Hmac::<sha1::Sha1>::new_from_slice(key).map_err(|_| Error::Hmac)?;
            m.update(data);
            m.finalize().into_bytes().to_vec()
        }
        DigestAlgorithm::Sha256 => {
            let mut m = Hmac::<sha2::Sha256>::new_from_slice(key).map_err(|_| Error::Hmac)?;
            m.update(data);
            m.finalize().into_bytes().to_vec()
        }
        DigestAlgorithm::Sha512 => {
            let mut m = Hmac::<sha2::Sha512>::new_from_slice(key).map_err(|_| Error::Hmac)?;
            m.update(data);
            m.finalize().into_bytes().to_vec()
        }
    })
}

/// One direction's worth of installed key material.
struct Keys {
    cipher_key: SecureBuffer,
    hmac_key: SecureBuffer,
}

pub struct CbcCrypto {
    cipher: BlockCipher,
    digest: DigestAlgorithm,
    enc: Option<Keys>,
    dec: Option<Keys>,
}

impl CbcCrypto {
    pub fn new(cipher: BlockCipher, digest: DigestAlgorithm) -> Self {
        Self { cipher, digest, enc: None, dec: None }
    }

    pub fn configure_encryption(&mut self, cipher_key: SecureBuffer, hmac_key: SecureBuffer) -> Result<()> {
        debug_assert!(self.enc.is_none(), "CbcCrypto::configure_encryption called twice");
        self.enc = Some(Keys { cipher_key, hmac_key });
        Ok(())
    }

    pub fn configure_decryption(&mut self, cipher_key: SecureBuffer, hmac_key: SecureBuffer) -> Result<()> {
        debug_assert!(self.dec.is_none(), "CbcCrypto::configure_decryption called twice");
        self.dec = Some(Keys { cipher_key, hmac_key });
        Ok(())
    }

    pub fn overhead_length(&self) -> usize {
        self.digest.output_len() + self.cipher.block_size() * 2
    }

    /// `T ∥ IV ∥ C`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let keys = self.enc.as_ref().expect("CbcCrypto: encrypt called before configure_encryption");
        let mut iv = vec![0u8; self.cipher.block_size()];
        crate::random::fill_random(&mut iv);

        let ciphertext = cbc_encrypt(self.cipher, keys.cipher_key.as_bytes(), &iv, plaintext)?;

        let mut iv_and_ciphertext = Vec::with_capacity(iv.len() + ciphertext.len());
        iv_and_ciphertext.extend_from_slice(&iv);
        iv_and_ciphertext.extend_from_slice(&ciphertext);
        let tag = hmac_tag(self.digest, keys.hmac_key.as_bytes(), &iv_and_ciphertext)?;

        let mut out = Vec::with_capacity(tag.len() + iv_and_ciphertext.len());
        out.extend_from_slice(&tag);
        out.extend_from_slice(&iv_and_ciphertext);
        Ok(out)
    }

    /// Inverse of [`CbcCrypto::encrypt`]; verifies `T` in constant time
    /// before attempting to decrypt.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        let keys = self.dec.as_ref().expect("CbcCrypto: decrypt called before configure_decryption");
        let tag_len = self.digest.output_len();
        let block_size = self.cipher.block_size();
        if envelope.len() < tag_len + block_size {
            return Err(Error::CryptoEncryption);
        }
        let (tag, iv_and_ciphertext) = envelope.split_at(tag_len);
        let expected_tag = hmac_tag(self.digest, keys.hmac_key.as_bytes(), iv_and_ciphertext)?;
        if expected_tag.ct_eq(tag).unwrap_u8() != 1 {
            return Err(Error::CryptoEncryption);
        }
        let (iv, ciphertext) = iv_and_ciphertext.split_at(block_size);
        cbc_decrypt(self.cipher, keys.cipher_key.as_bytes(), iv, ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys16() -> (SecureBuffer, SecureBuffer) {
        (SecureBuffer::from_bytes(&(0u8..16).collect::<Vec<_>>()), SecureBuffer::from_bytes(&(0x10u8..0x24).collect::<Vec<_>>()))
    }

    #[test]
    fn round_trips_aes128_sha1() {
        let mut c = CbcCrypto::new(BlockCipher::Aes128, DigestAlgorithm::Sha1);
        let (ck, hk) = keys16();
        c.configure_encryption(ck.clone(), hk.clone()).unwrap();
        c.configure_decryption(ck, hk).unwrap();

        let envelope = c.encrypt(b"hello").unwrap();
        let plaintext = c.decrypt(&envelope).unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn shared_keys_interoperate_across_objects() {
        let (ck, hk) = keys16();
        let mut enc_side = CbcCrypto::new(BlockCipher::Aes128, DigestAlgorithm::Sha1);
        enc_side.configure_encryption(ck.clone(), hk.clone()).unwrap();
        let mut dec_side = CbcCrypto::new(BlockCipher::Aes128, DigestAlgorithm::Sha1);
        dec_side.configure_decryption(ck, hk).unwrap();

        let envelope = enc_side.encrypt(b"shared keys").unwrap();
        assert_eq!(dec_side.decrypt(&envelope).unwrap(), b"shared keys");
    }

    #[test]
    fn bit_flip_in_envelope_fails_authentication() {
        let mut c = CbcCrypto::new(BlockCipher::Aes256, DigestAlgorithm::Sha256);
        let ck = SecureBuffer::from_bytes(&[7u8; 32]);
        let hk = SecureBuffer::from_bytes(&[9u8; 32]);
        c.configure_encryption(ck.clone(), hk.clone()).unwrap();
        c.configure_decryption(ck, hk).unwrap();

        let mut envelope = c.encrypt(b"X").unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0x01;
        assert_eq!(c.decrypt(&envelope), Err(Error::CryptoEncryption));
    }

    #[test]
    fn blowfish_round_trips() {
        let mut c = CbcCrypto::new(BlockCipher::Blowfish, DigestAlgorithm::Sha512);
        let ck = SecureBuffer::from_bytes(&[3u8; 16]);
        let hk = SecureBuffer::from_bytes(&[5u8; 32]);
        c.configure_encryption(ck.clone(), hk.clone()).unwrap();
        c.configure_decryption(ck, hk).unwrap();

        let envelope = c.encrypt(b"blowfish payload").unwrap();
        assert_eq!(c.decrypt(&envelope).unwrap(), b"blowfish payload");
    }
}
