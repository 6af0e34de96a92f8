use hex_literal::hex;

/**
    Public key of the Widevine root DrmCertificate.

    Service certificates handed to [`Cdm::set_service_certificate`](crate::Cdm::set_service_certificate)
    must carry an RSA-PSS-SHA1 signature made by this key.
*/
pub const ROOT_PUBLIC_KEY_N: [u8; 384] = hex!(
    "b4fe39c3659003db3c119709e868cdf2"
    "c35e9bf2e74d23b110db8765dfdcfb9f"
    "35a05703534cf66d357da678dbb336d2"
    "3f9c40a99526727fb8be66dfc5219878"
    "1516685d2f460e43cb8a8439abfbb035"
    "8022be34238bab535b72ec4bb5486953"
    "3e475ffd09fda776138f0f92d64cdfae"
    "76a9bad92210a99d7145d6d7e1192585"
    "9c539a97eb84d7cca8888220702620fd"
    "7e405027e225936fbc3e72a0fac1bd29"
    "b44d825cc1b4cb9c727eb0e98a173e19"
    "63fcfd82482bb7b233b97dec4bba891f"
    "27b89b884884aa18920e65f5c86c11ff"
    "6b36e47434ca8c33b1f9b88eb4e612e0"
    "029879525e4533ff11dcebc353ba7c60"
    "1a113d00fbd2b7aa30fa4f5e48775b17"
    "dc75ef6fd2196ddcbe7fb0788fdc8260"
    "4cbfe429065e698c3913ad1425ed19b2"
    "f29f01820d564488c835ec1f11b324e0"
    "590d37e4473cea4b7f97311c817c948a"
    "4c7d681584ffa508fd18e7e72be44727"
    "1211b823ec58933cac12d2886d413dc5"
    "fe1cdcb9f8d4513e07e5036fa712e812"
    "f7b5cea696553f78b4648250d2335f91"
);

pub const ROOT_PUBLIC_KEY_E: [u8; 3] = hex!("010001");

/// `LicenseRequest.protocol_version` sent with every generated challenge (VERSION_2_1).
pub const PROTOCOL_VERSION: i32 = 21;
