pub mod admin;
pub mod chat;
pub mod pharmacy;
pub mod pharmacy_input;
pub mod search;
pub mod user;
pub mod user_input;

pub use admin::DashboardStats;
pub use chat::{ChatMessage, ConversationSummary, NewChatMessage, PostMessageInput};
pub use pharmacy::{NearbyPharmacy, NewPharmacy, Pharmacy, PharmacyPatch, StockEntry, Storefront};
pub use pharmacy_input::{
    LowStockQuery, LowStockReport, PharmacyDetailsInput, PharmacyMutationResponse, ReplaceStockInput, StockEntryInput,
    UpdatePharmacyInput, UpdateStockEntryInput,
};
pub use search::{PharmacyMatch, SearchQuery};
pub use user::{NewUser, Role, User, UserPatch};
pub use user_input::{
    LoginInput, LoginResponse, OtpRequestInput, OtpVerifyInput, OtpVerifyResponse, RegisterInput, RegisterResponse,
    ResetPasswordInput, SuccessResponse, UpdateUserInput, UserListQuery, UserStatusInput,
};
