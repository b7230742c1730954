// Adapters implementing the ports in `app::ports`

pub mod browser;
pub mod gemini;
pub mod http_client;
pub mod sheets;
pub mod supabase;
