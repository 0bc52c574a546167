use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Principal;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::Role;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;
use crate::user::ports::PrincipalLookup;
use crate::user::ports::UserRepository;
use crate::user::ports::UserServicePort;

/// Domain service implementation for user operations.
///
/// Concrete implementation of UserServicePort and PrincipalLookup over a
/// user repository.
pub struct UserService<UR>
where
    UR: UserRepository,
{
    repository: Arc<UR>,
    password_hasher: auth::PasswordHasher,
}

impl<UR> UserService<UR>
where
    UR: UserRepository,
{
    pub fn new(repository: Arc<UR>) -> Self {
        Self {
            repository,
            password_hasher: auth::PasswordHasher::new(),
        }
    }

    async fn create_with_role(
        &self,
        command: RegisterUserCommand,
        role: Role,
    ) -> Result<User, UserError> {
        if self
            .repository
            .find_by_email(command.email.as_str())
            .await?
            .is_some()
        {
            return Err(UserError::EmailAlreadyExists(command.email.to_string()));
        }

        let password_hash = self.password_hasher.hash(&command.password)?;

        let user = User {
            id: UserId::new(),
            name: command.name,
            email: command.email,
            city: command.city,
            role,
            password_hash,
            created_at: Utc::now(),
        };

        self.repository.create(user).await
    }
}

#[async_trait]
impl<UR> UserServicePort for UserService<UR>
where
    UR: UserRepository,
{
    async fn register_user(&self, command: RegisterUserCommand) -> Result<User, UserError> {
        let user = self.create_with_role(command, Role::User).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "User registered");
        Ok(user)
    }

    async fn ensure_admin(&self, command: RegisterUserCommand) -> Result<User, UserError> {
        if let Some(existing) = self
            .repository
            .find_by_email(command.email.as_str())
            .await?
        {
            if existing.role != Role::Admin {
                tracing::warn!(
                    email = %existing.email,
                    role = %existing.role,
                    "Bootstrap admin email belongs to a non-admin account; leaving it unchanged"
                );
            }
            return Ok(existing);
        }

        let user = self.create_with_role(command, Role::Admin).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, UserError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn get_user_by_email(&self, email: &EmailAddress) -> Result<User, UserError> {
        self.repository
            .find_by_email(email.as_str())
            .await?
            .ok_or(UserError::NotFoundByEmail(email.to_string()))
    }

    async fn list_users(&self) -> Result<Vec<User>, UserError> {
        self.repository.list_all().await
    }

    async fn update_user(
        &self,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<User, UserError> {
        let mut user = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;

        if let Some(new_email) = command.email {
            if new_email != user.email {
                let owner = self.repository.find_by_email(new_email.as_str()).await?;
                if owner.is_some_and(|owner| owner.id != user.id) {
                    return Err(UserError::EmailAlreadyExists(new_email.to_string()));
                }
                user.email = new_email;
            }
        }

        if let Some(new_name) = command.name {
            user.name = new_name;
        }

        if let Some(new_city) = command.city {
            user.city = Some(new_city);
        }

        if let Some(new_role) = command.role {
            user.role = new_role;
        }

        // An empty password in an update means "keep the current one".
        if let Some(new_password) = command.password.filter(|p| !p.is_empty()) {
            user.password_hash = self.password_hasher.hash(&new_password)?;
        }

        let updated_user = self.repository.update(user).await?;
        tracing::info!(user_id = %updated_user.id, "User updated");

        Ok(updated_user)
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), UserError> {
        self.repository.delete(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }
}

#[async_trait]
impl<UR> PrincipalLookup for UserService<UR>
where
    UR: UserRepository,
{
    async fn load_principal(&self, subject: &str) -> Result<Principal, UserError> {
        self.repository
            .find_by_email(subject)
            .await?
            .map(|user| Principal::from(&user))
            .ok_or_else(|| UserError::PrincipalNotFound(subject.to_string()))
    }
}
