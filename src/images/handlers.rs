//! Upload and removal of product images

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use chrono::Utc;
use uuid::Uuid;

use super::{ImageStore, VARIANT_CONTENT_TYPE, variant_key};
use crate::catalog::model::{ImageVariant, Product, ProductImage};
use crate::core::envelope::{Envelope, EnvelopeResponse};
use crate::core::error::{ApiError, EntityError, ImageError, Result, ValidationError};
use crate::core::extractors::AdminUser;
use crate::core::validation::PathParams;
use crate::server::host::AppState;

/// Multipart field carrying the file
pub const IMAGE_FIELD: &str = "image";

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ImageError::TooLarge { limit }.into()
    } else {
        ValidationError::MalformedBody(err.body_text()).into()
    }
}

/// Read a field, giving up as soon as it exceeds `limit`
async fn read_limited(mut field: Field<'_>, limit: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if bytes.len() + chunk.len() > limit {
            return Err(ImageError::TooLarge { limit }.into());
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// The declared content type and bytes of the `image` field
async fn read_image_field(
    multipart: &mut Multipart,
    limit: usize,
) -> Result<(Option<String>, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = read_limited(field, limit).await?;
        return Ok((content_type, bytes));
    }
    Err(ImageError::MissingFile(IMAGE_FIELD.to_string()).into())
}

/// Remove every stored variant of an image; failures are logged, not raised
pub async fn discard_files(store: &dyn ImageStore, image: &ProductImage) {
    for variant in &image.variants {
        if let Err(e) = store.delete(&variant.key).await {
            tracing::warn!(key = %variant.key, error = %e, "failed to delete image file");
        }
    }
}

/// POST /api/products/{id}/images
pub async fn upload_image(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParams(product_id): PathParams<Uuid>,
    mut multipart: Multipart,
) -> Result<EnvelopeResponse<ProductImage>> {
    if state.stores.products.get(&product_id).await?.is_none() {
        return Err(EntityError::not_found("product", product_id).into());
    }

    let limit = state.pipeline.max_upload_bytes();
    let (content_type, bytes) = read_image_field(&mut multipart, limit).await?;
    state.pipeline.validate(content_type.as_deref(), &bytes)?;
    let rendered = state.pipeline.process(bytes).await?;

    let mut image = ProductImage {
        id: Uuid::new_v4(),
        variants: Vec::with_capacity(rendered.len()),
        uploaded_at: Utc::now(),
    };

    for variant in rendered {
        let key = variant_key(&product_id, &image.id, &variant.name);
        match state
            .image_store
            .put(&key, variant.bytes, VARIANT_CONTENT_TYPE)
            .await
        {
            Ok(url) => image.variants.push(ImageVariant {
                name: variant.name,
                key,
                url,
                width: variant.width,
                height: variant.height,
            }),
            Err(e) => {
                discard_files(state.image_store.as_ref(), &image).await;
                return Err(e);
            }
        }
    }

    // The product may have been deleted while we were resizing
    if let Err(e) = state
        .stores
        .products
        .add_image(&product_id, image.clone())
        .await
    {
        discard_files(state.image_store.as_ref(), &image).await;
        return Err(e);
    }
    state.cache.invalidate_product(&product_id);

    tracing::info!(
        product_id = %product_id,
        image_id = %image.id,
        admin = %admin.user_id,
        variants = image.variants.len(),
        "product image uploaded"
    );
    Ok(Envelope::created("Image uploaded", image))
}

/// DELETE /api/products/{id}/images/{image_id}
pub async fn delete_image(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    PathParams((product_id, image_id)): PathParams<(Uuid, Uuid)>,
) -> Result<Envelope<Product>> {
    let (product, removed) = state
        .stores
        .products
        .remove_image(&product_id, &image_id)
        .await?;
    discard_files(state.image_store.as_ref(), &removed).await;
    state.cache.invalidate_product(&product_id);

    tracing::info!(product_id = %product_id, image_id = %image_id, "product image deleted");
    Ok(Envelope::ok("Image deleted", product))
}
