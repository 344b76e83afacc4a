use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::db::{Database, StoreError};

const MIN_PASSWORD_LENGTH: usize = 6;

/// Register a local account. Returns the message shown inline in the form.
pub async fn sign_up(db: &Database, email: &str, password: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(anyhow!("请输入有效的邮箱地址"));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(anyhow!("密码至少需要 {} 个字符", MIN_PASSWORD_LENGTH));
    }

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map_err(|_| anyhow!("Failed to hash password"))?
        .to_string();

    match db.create_user(email, &password_hash).await {
        Ok(_) => Ok("注册成功，请登录。".to_string()),
        Err(StoreError::ConstraintViolation) => Err(anyhow!("该邮箱已注册")),
        Err(e) => Err(e.into()),
    }
}

/// Verify credentials. Wrong email and wrong password get the same message.
pub async fn sign_in(db: &Database, email: &str, password: &str) -> Result<String> {
    let Some(user) = db.get_user_by_email(email.trim()).await? else {
        return Err(anyhow!("邮箱或密码错误"));
    };

    let parsed_hash =
        PasswordHash::new(&user.password_hash).map_err(|_| anyhow!("邮箱或密码错误"))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
    {
        Ok("登录成功。".to_string())
    } else {
        Err(anyhow!("邮箱或密码错误"))
    }
}
