use std::sync::Arc;

use drm_core::{ContentHeader, ContentKey, KeyType};
use drm_widevine::{Cdm, CdmResult, LicenseType, SessionId};

/**
    The DRM client used by full negotiation to build its own challenges and
    parse the licenses that answer them.

    [`Cdm`] is the production implementation. Every call may be slow; the
    engine never holds a lock across one.
*/
pub trait LicenseClient: Send + Sync {
    fn open(&self) -> CdmResult<SessionId>;

    /// Install a service certificate on a session, returning its provider id.
    fn set_service_certificate(&self, session: SessionId, certificate: &[u8]) -> CdmResult<String>;

    fn get_license_challenge(
        &self,
        session: SessionId,
        header: &ContentHeader,
        license_type: LicenseType,
        optional_parameters: &[(String, String)],
    ) -> CdmResult<Vec<u8>>;

    /// Verify and unwrap a license. Fails on a signature mismatch.
    fn parse_license(&self, session: SessionId, license: &[u8]) -> CdmResult<()>;

    fn get_keys(&self, session: SessionId, filter: Option<KeyType>) -> CdmResult<Vec<ContentKey>>;

    fn close(&self, session: SessionId) -> CdmResult<()>;
}

impl LicenseClient for Cdm {
    fn open(&self) -> CdmResult<SessionId> {
        Cdm::open(self)
    }

    fn set_service_certificate(&self, session: SessionId, certificate: &[u8]) -> CdmResult<String> {
        Cdm::set_service_certificate(self, session, certificate)
    }

    fn get_license_challenge(
        &self,
        session: SessionId,
        header: &ContentHeader,
        license_type: LicenseType,
        optional_parameters: &[(String, String)],
    ) -> CdmResult<Vec<u8>> {
        Cdm::get_license_challenge(self, session, header, license_type, optional_parameters)
    }

    fn parse_license(&self, session: SessionId, license: &[u8]) -> CdmResult<()> {
        Cdm::parse_license(self, session, license)
    }

    fn get_keys(&self, session: SessionId, filter: Option<KeyType>) -> CdmResult<Vec<ContentKey>> {
        Cdm::get_keys(self, session, filter)
    }

    fn close(&self, session: SessionId) -> CdmResult<()> {
        Cdm::close(self, session)
    }
}

impl<C: LicenseClient + ?Sized> LicenseClient for Arc<C> {
    fn open(&self) -> CdmResult<SessionId> {
        (**self).open()
    }

    fn set_service_certificate(&self, session: SessionId, certificate: &[u8]) -> CdmResult<String> {
        (**self).set_service_certificate(session, certificate)
    }

    fn get_license_challenge(
        &self,
        session: SessionId,
        header: &ContentHeader,
        license_type: LicenseType,
        optional_parameters: &[(String, String)],
    ) -> CdmResult<Vec<u8>> {
        (**self).get_license_challenge(session, header, license_type, optional_parameters)
    }

    fn parse_license(&self, session: SessionId, license: &[u8]) -> CdmResult<()> {
        (**self).parse_license(session, license)
    }

    fn get_keys(&self, session: SessionId, filter: Option<KeyType>) -> CdmResult<Vec<ContentKey>> {
        (**self).get_keys(session, filter)
    }

    fn close(&self, session: SessionId) -> CdmResult<()> {
        (**self).close(session)
    }
}
