/*!
# Homelink DevKit - Stubs et utilitaires pour développement

Bibliothèque facilitant le développement de la passerelle sans compte
Adafruit IO ni broker réel :
- Stub broker enregistrant publications et souscriptions
- Simulation de messages entrants sur les topics feeds
- Scripts capteurs générant des relevés synthétiques plausibles
*/

pub mod broker_stub;
pub mod feed_script;

pub use broker_stub::MockBrokerClient;
pub use feed_script::SensorScript;
