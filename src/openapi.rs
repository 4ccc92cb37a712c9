use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::Modify;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MedFinder API",
        version = "1.0.0",
        description = "Find nearby pharmacies holding a medicine in stock, and manage pharmacy stock"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // Health
        crate::handlers::health::health_check,
        crate::handlers::metrics::metrics_handler,

        // Search
        crate::handlers::search_handler::search_pharmacies,

        // Auth
        crate::handlers::auth_handler::register,
        crate::handlers::auth_handler::login,
        crate::handlers::auth_handler::get_me,
        crate::handlers::auth_handler::request_otp,
        crate::handlers::auth_handler::verify_otp,
        crate::handlers::auth_handler::reset_password,

        // Pharmacies and stock
        crate::handlers::pharmacies_handler::get_pharmacy,
        crate::handlers::pharmacies_handler::get_my_pharmacies,
        crate::handlers::pharmacies_handler::update_pharmacy,
        crate::handlers::pharmacies_handler::add_stock_entry,
        crate::handlers::pharmacies_handler::replace_stock,
        crate::handlers::pharmacies_handler::update_stock_entry,
        crate::handlers::pharmacies_handler::remove_stock_entry,
        crate::handlers::pharmacies_handler::get_low_stock,

        // Admin
        crate::handlers::admin_handler::list_users,
        crate::handlers::admin_handler::get_user,
        crate::handlers::admin_handler::update_user,
        crate::handlers::admin_handler::set_user_status,
        crate::handlers::admin_handler::delete_user,
        crate::handlers::admin_handler::list_pharmacies,
        crate::handlers::admin_handler::get_pharmacy,
        crate::handlers::admin_handler::delete_pharmacy,
        crate::handlers::admin_handler::get_stats,

        // Chat
        crate::handlers::chat_handler::get_my_messages,
        crate::handlers::chat_handler::post_message,
        crate::handlers::chat_handler::list_conversations,
        crate::handlers::chat_handler::get_conversation,
        crate::handlers::chat_handler::reply,
    ),
    components(
        schemas(
            // Core models
            crate::geo::GeoPoint,
            crate::models::Role,
            crate::models::User,
            crate::models::Pharmacy,
            crate::models::StockEntry,
            crate::models::PharmacyMatch,
            crate::models::ChatMessage,
            crate::models::ConversationSummary,
            crate::models::DashboardStats,
            crate::models::LowStockReport,

            // Input models
            crate::models::RegisterInput,
            crate::models::PharmacyDetailsInput,
            crate::models::LoginInput,
            crate::models::OtpRequestInput,
            crate::models::OtpVerifyInput,
            crate::models::ResetPasswordInput,
            crate::models::UpdatePharmacyInput,
            crate::models::StockEntryInput,
            crate::models::ReplaceStockInput,
            crate::models::UpdateStockEntryInput,
            crate::models::UpdateUserInput,
            crate::models::UserStatusInput,
            crate::models::PostMessageInput,

            // Responses
            crate::models::RegisterResponse,
            crate::models::LoginResponse,
            crate::models::OtpVerifyResponse,
            crate::models::SuccessResponse,
            crate::models::PharmacyMutationResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check and metrics"),
        (name = "search", description = "Geo-search for medicine availability"),
        (name = "auth", description = "Registration, login and password recovery"),
        (name = "pharmacies", description = "Pharmacy records"),
        (name = "stock", description = "Owner stock management"),
        (name = "admin", description = "User and pharmacy moderation"),
        (name = "chat", description = "Patient support conversations"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}
