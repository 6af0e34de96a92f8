use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::RngCore;
use rsa::RsaPublicKey;

use drm_core::{ContentHeader, ContentKey, KeyType};

use crate::crypto::privacy::ServiceCertificate;
use crate::device::Device;
use crate::error::{CdmError, CdmResult};
use crate::session::Session;
use crate::types::LicenseType;

/// Upper bound on concurrently open sessions per [`Cdm`].
pub const MAX_SESSIONS: usize = 16;

/**
    Opaque handle for a session opened with [`Cdm::open`].
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; 16]);

impl SessionId {
    fn random() -> Self {
        let mut id = [0u8; 16];
        rand::rng().fill_bytes(&mut id);
        Self(id)
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({self})")
    }
}

/**
    A content decryption module backed by one provisioned [`Device`].

    All operations take `&self`; a `Cdm` can be shared between threads.
    The session table is locked only to look a session up, so a slow
    operation on one session does not stall the others.

    ```ignore
    let cdm = Cdm::from_device(Device::from_bytes(&wvd)?);
    let session = cdm.open()?;
    let challenge = cdm.get_license_challenge(session, &header, LicenseType::Streaming, &[])?;
    // ... POST the challenge to the license server ...
    cdm.parse_license(session, &response)?;
    let keys = cdm.get_keys(session, Some(KeyType::Content))?;
    cdm.close(session)?;
    ```
*/
#[derive(Debug)]
pub struct Cdm {
    device: Device,
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<Session>>>>,
    session_counter: AtomicU64,
    service_root: Option<RsaPublicKey>,
}

impl Cdm {
    pub fn from_device(device: Device) -> Self {
        Self {
            device,
            sessions: Mutex::new(HashMap::new()),
            session_counter: AtomicU64::new(1),
            service_root: None,
        }
    }

    /**
        Verify service certificates against `root` instead of the Widevine
        production root, e.g. for a staging license service.
    */
    pub fn with_service_root(mut self, root: RsaPublicKey) -> Self {
        self.service_root = Some(root);
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn open_sessions(&self) -> usize {
        self.table().len()
    }

    pub fn open(&self) -> CdmResult<SessionId> {
        let mut sessions = self.table();
        if sessions.len() >= MAX_SESSIONS {
            return Err(CdmError::TooManySessions(MAX_SESSIONS));
        }

        let mut id = SessionId::random();
        while sessions.contains_key(&id) {
            id = SessionId::random();
        }
        let number = self.session_counter.fetch_add(1, Ordering::Relaxed);
        sessions.insert(id, Arc::new(Mutex::new(Session::new(number))));
        Ok(id)
    }

    pub fn close(&self, id: SessionId) -> CdmResult<()> {
        self.table()
            .remove(&id)
            .map(drop)
            .ok_or_else(|| CdmError::SessionNotFound(id.to_string()))
    }

    /**
        Verify a service certificate against the service root and install it
        on the session (privacy mode). Returns the certificate's provider id.
    */
    pub fn set_service_certificate(&self, id: SessionId, raw: &[u8]) -> CdmResult<String> {
        let certificate = match &self.service_root {
            Some(root) => ServiceCertificate::from_bytes_with_root(raw, root)?,
            None => ServiceCertificate::from_bytes(raw)?,
        };
        let provider_id = certificate.provider_id().to_owned();
        let session = self.session(id)?;
        lock(&*session).set_service_certificate(certificate);
        Ok(provider_id)
    }

    pub fn get_license_challenge(
        &self,
        id: SessionId,
        header: &ContentHeader,
        license_type: LicenseType,
        optional_parameters: &[(String, String)],
    ) -> CdmResult<Vec<u8>> {
        let session = self.session(id)?;
        lock(&*session).license_challenge(&self.device, header, license_type, optional_parameters)
    }

    pub fn parse_license(&self, id: SessionId, raw: &[u8]) -> CdmResult<()> {
        let session = self.session(id)?;
        lock(&*session).parse_license(&self.device, raw)
    }

    pub fn get_keys(&self, id: SessionId, filter: Option<KeyType>) -> CdmResult<Vec<ContentKey>> {
        let session = self.session(id)?;
        Ok(lock(&*session).keys(filter))
    }

    fn session(&self, id: SessionId) -> CdmResult<Arc<Mutex<Session>>> {
        self.table()
            .get(&id)
            .cloned()
            .ok_or_else(|| CdmError::SessionNotFound(id.to_string()))
    }

    fn table(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Mutex<Session>>>> {
        lock(&self.sessions)
    }
}

/// A panic while holding a lock leaves plain data behind; keep using it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
