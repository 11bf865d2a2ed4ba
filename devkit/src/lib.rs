/*!
# RUL DevKit - Stubs et utilitaires de test

Bibliothèque facilitant les tests du backend et du dashboard avec:
- Stub HTTP jouant l'API backend et le service ML (sans processus externe)
- Fixtures JSON conformes aux contrats de l'API
- Générateur de fichiers FD002 synthétiques
*/

pub mod api_stub;
pub mod fixtures;
pub mod test_utils;

pub use api_stub::{StubApi, StubServer};
pub use test_utils::TestHarness;
