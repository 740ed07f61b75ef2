// Licensed under the Apache-2.0 license

//! Encodings of the enumerated command word and descriptor fields.

macro_rules! field_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $val:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $val,)*
        }

        impl From<$name> for u8 {
            fn from(val: $name) -> u8 {
                val as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;
            fn try_from(val: u8) -> Result<Self, u8> {
                match val {
                    $($val => Ok(Self::$variant),)*
                    other => Err(other),
                }
            }
        }
    };
}

field_enum! {
    /// CL word0 cipher mode field
    pub enum CipherModeSel {
        Ecb = 0,
        Cbc = 1,
        Cfb = 2,
        Ofb = 3,
        Ctr = 4,
        Gcm = 8,
    }
}

field_enum! {
    /// CL word0 AES key size selector
    pub enum KeySizeSel {
        Aes128 = 0,
        Aes192 = 1,
        Aes256 = 2,
    }
}

field_enum! {
    /// CL word0 hash mode selector
    pub enum HashModeSel {
        Md5 = 0,
        Sha1 = 1,
        Sha224 = 2,
        Sha256 = 3,
        Sha384 = 4,
        Sha512 = 5,
    }
}

field_enum! {
    /// CL word0 engine mode
    pub enum EngineMode {
        CipherOnly = 0,
        HashOnly = 1,
        /// Cipher and authentication in one pass (GCM)
        Mixed = 2,
    }
}

field_enum! {
    /// Source descriptor command-length selector
    pub enum CommandLength {
        /// Data phase descriptor
        Data = 0,
        /// Command word only
        Cl = 1,
        /// Command word followed by the key (or HMAC pad array)
        ClKey = 2,
        /// Command word, key and IV (or intermediate hash state)
        ClKeyIv = 3,
    }
}
