pub mod per_user_pool;
